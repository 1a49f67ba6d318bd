pub mod dynamic;
pub mod menu;
pub mod rbac;
