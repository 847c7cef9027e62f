pub mod sqlite_graph_store;
pub mod sqlite_incident_store;

pub use sqlite_graph_store::SqliteGraphStore;
pub use sqlite_incident_store::SqliteIncidentStore;
