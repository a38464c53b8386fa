// Copyright 2026 the matescan developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Structural classification of checkmate positions. Given the final
//! position of a finished game (piece placement plus the side to move, who
//! is the side that got mated), the analyzer works out who checks the king,
//! where the king could not run, which defenders were pinned in place, and
//! whether the mate fits a named pattern such as a double check or a
//! smothered mate.

#[macro_use]
extern crate num_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

mod analysis;
mod position;
mod types;

pub use analysis::{classify, AnalysisError, Analyzer, MatePattern, MateReport, Pin};
pub use position::{FenParseError, Position};
pub use types::{Color, File, Piece, PieceKind, Rank, Square};
