//! Shared type definitions for the Settlers game server.
//!
//! This crate is the single source of truth for the identifiers, map
//! coordinates and JSON payloads used across the workspace. Types flow
//! downstream to `TypeScript` via `ts-rs` for the browser client.
//!
//! # Modules
//!
//! - [`ids`] -- Engine keys and the stable external [`ObjectId`]
//! - [`geometry`] -- Map points and the triangle-grid neighbourhood
//! - [`enums`] -- Materials, states, vegetation and other enumerations
//! - [`views`] -- Per-player snapshots, entity views and change sets
//! - [`structs`] -- Request and response bodies of the REST surface

pub mod enums;
pub mod geometry;
pub mod ids;
pub mod structs;
pub mod views;

// Re-export all public types at crate root for convenience.
pub use enums::{
    BuildingState, Construction, CropState, GameStatus, Material, PlayerType, Rank, ResourceLevel,
    SignAmount, SignType, Size, Vegetation, WorkerType,
};
pub use geometry::Point;
pub use ids::{EntityKey, GameKey, MapKey, ObjectId, ParseObjectIdError, PlayerKey, WorldKey};
pub use structs::{
    FindRoadRequest, FindRoadResponse, GameUpdate, GameView, HouseUpdate, LandStatisticsView,
    MapView, MaterialStatistics, Measurement, MessageResponse, NewGame, NewHouse, NewPlayer,
    NewRoad, PlayerSummary, PlayerUpdate, PlayerView, PointCommand, PointDetails,
    ProductionStatisticsView, TerrainView,
};
pub use views::{
    AvailableConstructionChange, BorderChange, BorderView, ChangeSet, CropView, FlagView,
    GameMessage, HouseView, Identified, ResourceAmount, RoadView, SignView, StoneView, TreeView,
    ViewSnapshot, WorkerView,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // Files are written to the `bindings/` directory relative to the
        // crate root.
        use ts_rs::TS;

        // IDs and geometry
        let _ = crate::ids::ObjectId::export_all();
        let _ = crate::geometry::Point::export_all();

        // Enums
        let _ = crate::enums::ResourceLevel::export_all();
        let _ = crate::enums::GameStatus::export_all();
        let _ = crate::enums::PlayerType::export_all();
        let _ = crate::enums::Size::export_all();
        let _ = crate::enums::Construction::export_all();
        let _ = crate::enums::BuildingState::export_all();
        let _ = crate::enums::Material::export_all();
        let _ = crate::enums::Vegetation::export_all();
        let _ = crate::enums::SignType::export_all();
        let _ = crate::enums::SignAmount::export_all();
        let _ = crate::enums::CropState::export_all();
        let _ = crate::enums::WorkerType::export_all();
        let _ = crate::enums::Rank::export_all();

        // Views
        let _ = crate::views::ResourceAmount::export_all();
        let _ = crate::views::HouseView::export_all();
        let _ = crate::views::FlagView::export_all();
        let _ = crate::views::RoadView::export_all();
        let _ = crate::views::TreeView::export_all();
        let _ = crate::views::StoneView::export_all();
        let _ = crate::views::WorkerView::export_all();
        let _ = crate::views::SignView::export_all();
        let _ = crate::views::CropView::export_all();
        let _ = crate::views::BorderView::export_all();
        let _ = crate::views::GameMessage::export_all();
        let _ = crate::views::ViewSnapshot::export_all();
        let _ = crate::views::BorderChange::export_all();
        let _ = crate::views::AvailableConstructionChange::export_all();
        let _ = crate::views::ChangeSet::export_all();

        // REST payloads
        let _ = crate::structs::MapView::export_all();
        let _ = crate::structs::TerrainView::export_all();
        let _ = crate::structs::PlayerView::export_all();
        let _ = crate::structs::PlayerSummary::export_all();
        let _ = crate::structs::GameView::export_all();
        let _ = crate::structs::NewPlayer::export_all();
        let _ = crate::structs::PlayerUpdate::export_all();
        let _ = crate::structs::NewGame::export_all();
        let _ = crate::structs::GameUpdate::export_all();
        let _ = crate::structs::NewHouse::export_all();
        let _ = crate::structs::HouseUpdate::export_all();
        let _ = crate::structs::NewRoad::export_all();
        let _ = crate::structs::PointCommand::export_all();
        let _ = crate::structs::PointDetails::export_all();
        let _ = crate::structs::FindRoadRequest::export_all();
        let _ = crate::structs::FindRoadResponse::export_all();
        let _ = crate::structs::MessageResponse::export_all();
        let _ = crate::structs::Measurement::export_all();
        let _ = crate::structs::LandStatisticsView::export_all();
        let _ = crate::structs::MaterialStatistics::export_all();
        let _ = crate::structs::ProductionStatisticsView::export_all();
    }
}
