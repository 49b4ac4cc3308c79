pub mod extraction;
pub mod listing;
pub mod mission;
pub mod proxy;
pub mod site;
pub mod table;
