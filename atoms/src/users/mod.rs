pub mod http;
pub mod model;
pub mod service;

pub use http::*;
pub use model::{
    AdminAllowList, ProfileView, RegistrationDetails, Role, UpdateRolePayload, UpdateUserPayload,
    UserProfile,
};
pub use service::*;
