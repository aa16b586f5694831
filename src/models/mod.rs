pub mod forecast;
pub mod product;
pub mod sale;

pub use forecast::ForecastView;
