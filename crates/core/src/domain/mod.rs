pub mod analysis;
pub mod contract;
pub mod forecast;
pub mod quote;
pub mod recommendation;
pub mod schema;
