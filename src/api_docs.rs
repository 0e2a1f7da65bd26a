use utoipa::OpenApi;
use crate::controllers::{polygon_controller, solar_controller};
use crate::models::{polygon, records, system};
use crate::services::{catalog, pipeline};
use crate::config;

#[derive(OpenApi)]
#[openapi(
    paths(
        polygon_controller::list_polygons,
        polygon_controller::create_polygon,
        polygon_controller::get_polygon,
        polygon_controller::delete_polygon,
        solar_controller::run_polygon_solar,
        solar_controller::get_polygon_solar,
        solar_controller::run_sweep,
        solar_controller::get_system_config
    ),
    components(
        schemas(
            polygon::Polygon,
            polygon::NewPolygon,
            records::AggregateValues,
            records::DayAggregate,
            records::MonthAggregate,
            records::YearAggregate,
            records::Aggregates,
            pipeline::SimulationReport,
            pipeline::SweepSummary,
            pipeline::SweepFailure,
            catalog::CecModule,
            catalog::Inverter,
            config::SimulationConfig,
            config::TrackerConfig,
            config::SolverConfig,
            config::WeatherConfig,
            system::SystemConfig,
            system::ApiError
        )
    ),
    tags(
        (name = "solar-yield", description = "Polygon solar yield API")
    )
)]
pub struct ApiDoc;
