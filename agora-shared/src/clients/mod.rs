pub mod db;
pub mod object_store;
