pub mod connections;
pub mod descriptor;
pub mod results;
pub mod schema;
