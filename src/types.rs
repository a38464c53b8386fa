// Copyright 2026 the matescan developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use num_traits::{FromPrimitive, ToPrimitive};
use std::convert::TryFrom;
use std::fmt::{self, Display, Write};

// TableIndex is a trait for all types that can serve as an index into a table.
// It is common to use these types as indices into tables, so this trait allows
// any type implementing To and FromPrimitive to be used as table indices.
pub trait TableIndex {
    fn as_index(self) -> usize;
    fn from_index(idx: usize) -> Self;
}

impl<T> TableIndex for T
where
    T: FromPrimitive + ToPrimitive,
{
    fn as_index(self) -> usize {
        self.to_u32().unwrap() as usize
    }

    fn from_index(idx: usize) -> T {
        <T as FromPrimitive>::from_u64(idx as u64).unwrap()
    }
}

/// A square on the board. The discriminant is `rank * 8 + file`, so the
/// natural enum order is the row-major, rank-1-first order the analyzer
/// scans in.
#[rustfmt::skip]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize)]
pub enum Square {
    A1, B1, C1, D1, E1, F1, G1, H1,
    A2, B2, C2, D2, E2, F2, G2, H2,
    A3, B3, C3, D3, E3, F3, G3, H3,
    A4, B4, C4, D4, E4, F4, G4, H4,
    A5, B5, C5, D5, E5, F5, G5, H5,
    A6, B6, C6, D6, E6, F6, G6, H6,
    A7, B7, C7, D7, E7, F7, G7, H7,
    A8, B8, C8, D8, E8, F8, G8, H8,
}

impl Square {
    pub fn of(rank: Rank, file: File) -> Square {
        let rank = rank.to_u32().unwrap();
        let file = file.to_u32().unwrap();
        FromPrimitive::from_u32(rank * 8 + file).unwrap()
    }

    pub fn rank(self) -> Rank {
        FromPrimitive::from_u32(self.to_u32().unwrap() >> 3).unwrap()
    }

    pub fn file(self) -> File {
        FromPrimitive::from_u32(self.to_u32().unwrap() & 7).unwrap()
    }

    /// Rank index as a signed number, 0 (rank 1) through 7 (rank 8).
    pub fn row(self) -> i32 {
        self.to_i32().unwrap() >> 3
    }

    /// File index as a signed number, 0 (file a) through 7 (file h).
    pub fn col(self) -> i32 {
        self.to_i32().unwrap() & 7
    }

    /// The square `drow` ranks and `dcol` files away, or None if that falls
    /// off the board.
    pub fn offset(self, drow: i32, dcol: i32) -> Option<Square> {
        let row = self.row() + drow;
        let col = self.col() + dcol;
        if row < 0 || row > 7 || col < 0 || col > 7 {
            return None;
        }

        Some(FromPrimitive::from_i32(row * 8 + col).unwrap())
    }

    /// All 64 squares in row-major ascending order (A1, B1, ... H8).
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64).map(Square::from_index)
    }
}

impl Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.file(), self.rank())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize)]
pub enum Rank {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
}

impl Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let chr = match self {
            Rank::One => '1',
            Rank::Two => '2',
            Rank::Three => '3',
            Rank::Four => '4',
            Rank::Five => '5',
            Rank::Six => '6',
            Rank::Seven => '7',
            Rank::Eight => '8',
        };
        f.write_char(chr)
    }
}

pub static RANKS: [Rank; 8] = [
    Rank::One,
    Rank::Two,
    Rank::Three,
    Rank::Four,
    Rank::Five,
    Rank::Six,
    Rank::Seven,
    Rank::Eight,
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize)]
pub enum File {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
}

impl Display for File {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let chr = match self {
            File::A => 'a',
            File::B => 'b',
            File::C => 'c',
            File::D => 'd',
            File::E => 'e',
            File::F => 'f',
            File::G => 'g',
            File::H => 'h',
        };
        f.write_char(chr)
    }
}

pub static FILES: [File; 8] = [
    File::A,
    File::B,
    File::C,
    File::D,
    File::E,
    File::F,
    File::G,
    File::H,
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn toggle(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let chr = match self {
            Color::White => 'w',
            Color::Black => 'b',
        };
        f.write_char(chr)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let chr = match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        f.write_char(chr)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
}

impl Piece {
    pub fn new(kind: PieceKind, color: Color) -> Piece {
        Piece { kind, color }
    }
}

impl TryFrom<char> for Piece {
    type Error = ();

    fn try_from(c: char) -> Result<Self, Self::Error> {
        let res = match c {
            'P' => Piece::new(PieceKind::Pawn, Color::White),
            'N' => Piece::new(PieceKind::Knight, Color::White),
            'B' => Piece::new(PieceKind::Bishop, Color::White),
            'R' => Piece::new(PieceKind::Rook, Color::White),
            'Q' => Piece::new(PieceKind::Queen, Color::White),
            'K' => Piece::new(PieceKind::King, Color::White),
            'p' => Piece::new(PieceKind::Pawn, Color::Black),
            'n' => Piece::new(PieceKind::Knight, Color::Black),
            'b' => Piece::new(PieceKind::Bishop, Color::Black),
            'r' => Piece::new(PieceKind::Rook, Color::Black),
            'q' => Piece::new(PieceKind::Queen, Color::Black),
            'k' => Piece::new(PieceKind::King, Color::Black),
            _ => return Err(()),
        };
        Ok(res)
    }
}

impl Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let chr = match (self.kind, self.color) {
            (PieceKind::Pawn, Color::White) => 'P',
            (PieceKind::Knight, Color::White) => 'N',
            (PieceKind::Bishop, Color::White) => 'B',
            (PieceKind::Rook, Color::White) => 'R',
            (PieceKind::Queen, Color::White) => 'Q',
            (PieceKind::King, Color::White) => 'K',
            (PieceKind::Pawn, Color::Black) => 'p',
            (PieceKind::Knight, Color::Black) => 'n',
            (PieceKind::Bishop, Color::Black) => 'b',
            (PieceKind::Rook, Color::Black) => 'r',
            (PieceKind::Queen, Color::Black) => 'q',
            (PieceKind::King, Color::Black) => 'k',
        };

        f.write_char(chr)
    }
}
