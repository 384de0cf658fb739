// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod diff;
pub mod ids;
pub mod model;
pub mod render;
pub mod revisions;
pub mod search;
pub mod state;
pub mod view;

pub use diff::*;
pub use ids::*;
pub use model::*;
pub use render::*;
pub use revisions::*;
pub use search::*;
pub use state::*;
pub use view::*;
