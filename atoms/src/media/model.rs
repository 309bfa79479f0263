use serde::Serialize;

/// A decoded photo ready for the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoArtifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Where an uploaded photo belongs in the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoPurpose {
    Borrow,
    Return,
}

impl PhotoPurpose {
    pub fn prefix(&self) -> &'static str {
        match self {
            PhotoPurpose::Borrow => "borrows",
            PhotoPurpose::Return => "returns",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Department {
    pub id: u32,
    pub name: &'static str,
    pub folder: &'static str,
    pub cover: &'static str,
    pub image_count: u32,
    pub file_type: &'static str,
}

pub const DEPARTMENTS: [Department; 8] = [
    Department { id: 1, name: "Accounting", folder: "accounting", cover: "/accounting.png", image_count: 8, file_type: "jpg" },
    Department { id: 2, name: "Electrical Power", folder: "electrical", cover: "/electrical.png", image_count: 16, file_type: "jpg" },
    Department { id: 3, name: "Marketing", folder: "marketing", cover: "/marketing.png", image_count: 8, file_type: "jpg" },
    Department { id: 4, name: "Business Computer", folder: "business-computer", cover: "/business-computer.png", image_count: 14, file_type: "jpg" },
    Department { id: 5, name: "Automotive", folder: "automotive", cover: "/automotive.png", image_count: 3, file_type: "jpg" },
    Department { id: 6, name: "Basic Techniques", folder: "basic-techniques", cover: "/basic-techniques.png", image_count: 6, file_type: "jpg" },
    Department { id: 7, name: "General Education", folder: "general-education", cover: "/general-education.png", image_count: 7, file_type: "jpg" },
    Department { id: 8, name: "Electronics", folder: "electronics", cover: "/electronics.png", image_count: 3, file_type: "jpg" },
];

impl Department {
    pub fn lookup(folder: &str) -> Option<Department> {
        DEPARTMENTS.iter().copied().find(|d| d.folder == folder)
    }
}

#[derive(Debug, Serialize)]
pub struct Gallery {
    pub department: Department,
    pub images: Vec<String>,
}
