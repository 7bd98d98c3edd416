// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod autosave;
pub mod binding;
pub mod confirm;
pub mod dom;
pub mod ids;
pub mod overlay;
pub mod page;
pub mod quick_edit;
pub mod save;
pub mod search;
pub mod sort;
pub mod timer;
pub mod validation;

pub use autosave::*;
pub use confirm::*;
pub use dom::*;
pub use ids::*;
pub use overlay::*;
pub use page::*;
pub use quick_edit::*;
pub use save::*;
pub use search::*;
pub use sort::*;
pub use timer::*;
pub use validation::*;
