pub mod leads;
pub mod users;
