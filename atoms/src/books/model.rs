use serde::{Deserialize, Serialize};

/// A book record. Stock is pooled per category: any record of the same
/// category can satisfy a borrow.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Book {
    pub book_id: String,
    pub name: String,
    pub category: String,
    pub stock: u32,
    pub cover_url: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookPayload {
    pub category: String,
    pub name: Option<String>,
    #[serde(default)]
    pub stock: u32,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockPayload {
    pub delta: i64,
}

/// One of the ten fixed classification codes.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub code: &'static str,
    pub name: &'static str,
}

pub const CATEGORIES: [Category; 10] = [
    Category { code: "000", name: "General & Computing" },
    Category { code: "100", name: "Philosophy" },
    Category { code: "200", name: "Religion" },
    Category { code: "300", name: "Social Sciences" },
    Category { code: "400", name: "Language" },
    Category { code: "500", name: "Science" },
    Category { code: "600", name: "Technology" },
    Category { code: "700", name: "Arts" },
    Category { code: "800", name: "Literature" },
    Category { code: "900", name: "History" },
];

impl Category {
    pub fn lookup(code: &str) -> Option<Category> {
        let code = code.trim();
        CATEGORIES.iter().copied().find(|c| c.code == code)
    }

    pub fn cover_url(&self) -> String {
        format!("/{}.jpg", self.code)
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CategoryView {
    pub code: &'static str,
    pub name: &'static str,
    pub cover_url: String,
}

impl From<Category> for CategoryView {
    fn from(c: Category) -> Self {
        Self {
            code: c.code,
            name: c.name,
            cover_url: c.cover_url(),
        }
    }
}
