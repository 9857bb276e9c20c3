pub mod handlers;
pub mod metrics;
pub mod server;
pub mod state;
pub mod status;
pub mod tabular;

pub use metrics::Metrics;
pub use server::{create_router, PredictionServer};
pub use state::AppState;
pub use status::NutritionStatus;
pub use tabular::TabularData;
