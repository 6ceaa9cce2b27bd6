//! Admin jobs: the non-trivial batch logic that runs on the same fabric as
//! the adapters (§4.3-§4.5). Each job takes a `&dyn StationStore` directly
//! rather than an `Engine`/`ProviderHandle`, since admin jobs read and
//! rewrite many stations at once and never enrich or submit measures.

mod clusters;
mod delete_stations;
mod duplicates;
mod ward;

pub use clusters::save_clusters;
pub use delete_stations::delete_stations;
pub use duplicates::find_duplicates;
