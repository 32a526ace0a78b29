//! Slot grid, payline, and paytable types.
//!
//! A grid is reel-major: `symbol(reel, row)` addresses the visible window cut
//! from each reel strip. Dimensions are fixed by [`ReelLayout`] at
//! configuration time and never vary per spin.

use crate::chain::{BetKey, BlockSeed};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, ReadRangeExt, Write};
use serde::{Deserialize, Serialize};

/// Maximum reels a layout may declare.
pub const MAX_REELS: u8 = 8;

/// Maximum visible rows a layout may declare.
pub const MAX_ROWS: u8 = 8;

/// Maximum winning lines a single outcome may carry.
pub const MAX_WINNING_LINES: usize = 64;

/// One reel symbol.
///
/// `Blank` is a real strip position (a miss), not an absence marker; it has no
/// paytable entry and so can never anchor or extend a win.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SymbolId {
    Blank = 0,
    Cherry = 1,
    Lemon = 2,
    Orange = 3,
    Plum = 4,
    Bell = 5,
    Bar = 6,
    Seven = 7,
    Diamond = 8,
}

impl Write for SymbolId {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for SymbolId {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = u8::read(reader)?;
        match value {
            0 => Ok(Self::Blank),
            1 => Ok(Self::Cherry),
            2 => Ok(Self::Lemon),
            3 => Ok(Self::Orange),
            4 => Ok(Self::Plum),
            5 => Ok(Self::Bell),
            6 => Ok(Self::Bar),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Diamond),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for SymbolId {
    const SIZE: usize = 1;
}

/// Fixed grid dimensions for a game variant (5×3 classic, 5×4 tall).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReelLayout {
    pub reels: u8,
    pub rows: u8,
}

impl ReelLayout {
    pub const fn new(reels: u8, rows: u8) -> Self {
        Self { reels, rows }
    }

    pub fn cells(&self) -> usize {
        self.reels as usize * self.rows as usize
    }

    pub fn is_valid(&self) -> bool {
        self.reels >= 1 && self.reels <= MAX_REELS && self.rows >= 1 && self.rows <= MAX_ROWS
    }
}

impl Write for ReelLayout {
    fn write(&self, writer: &mut impl BufMut) {
        self.reels.write(writer);
        self.rows.write(writer);
    }
}

impl Read for ReelLayout {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let layout = Self {
            reels: u8::read(reader)?,
            rows: u8::read(reader)?,
        };
        if !layout.is_valid() {
            return Err(Error::Invalid("ReelLayout", "dimensions out of range"));
        }
        Ok(layout)
    }
}

impl FixedSize for ReelLayout {
    const SIZE: usize = 2;
}

/// The visible symbol window, reel-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    layout: ReelLayout,
    symbols: Vec<SymbolId>,
}

impl Grid {
    /// Build a grid from reel-major symbols. Returns `None` if the symbol
    /// count does not match the layout.
    pub fn new(layout: ReelLayout, symbols: Vec<SymbolId>) -> Option<Self> {
        if !layout.is_valid() || symbols.len() != layout.cells() {
            return None;
        }
        Some(Self { layout, symbols })
    }

    pub fn layout(&self) -> ReelLayout {
        self.layout
    }

    pub fn symbol(&self, reel: u8, row: u8) -> SymbolId {
        self.symbols[reel as usize * self.layout.rows as usize + row as usize]
    }

    pub fn symbols(&self) -> &[SymbolId] {
        &self.symbols
    }
}

impl Write for Grid {
    fn write(&self, writer: &mut impl BufMut) {
        self.layout.write(writer);
        self.symbols.write(writer);
    }
}

impl Read for Grid {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let layout = ReelLayout::read(reader)?;
        let symbols = Vec::<SymbolId>::read_range(reader, 1..=(MAX_REELS as usize * MAX_ROWS as usize))?;
        Grid::new(layout, symbols).ok_or(Error::Invalid("Grid", "symbol count mismatch"))
    }
}

impl EncodeSize for Grid {
    fn encode_size(&self) -> usize {
        self.layout.encode_size() + self.symbols.encode_size()
    }
}

/// A path through the grid: one row index per reel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaylinePattern(pub Vec<u8>);

impl PaylinePattern {
    /// True when the pattern addresses every reel of `layout` with an
    /// in-range row.
    pub fn fits(&self, layout: &ReelLayout) -> bool {
        self.0.len() == layout.reels as usize && self.0.iter().all(|row| *row < layout.rows)
    }
}

/// Payout multipliers for one symbol at 3/4/5 consecutive matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaytableEntry {
    pub symbol: SymbolId,
    pub three: u64,
    pub four: u64,
    pub five: u64,
}

impl PaytableEntry {
    pub fn multiplier(&self, match_count: u8) -> u64 {
        match match_count {
            3 => self.three,
            4 => self.four,
            5 => self.five,
            _ => 0,
        }
    }
}

/// Immutable paytable configuration.
///
/// Wild handling is configuration-defined: if `wild` is set, that symbol
/// substitutes for any paying symbol during payline evaluation. Symbols with
/// no entry never pay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paytable {
    pub entries: Vec<PaytableEntry>,
    pub wild: Option<SymbolId>,
}

impl Paytable {
    pub fn entry(&self, symbol: SymbolId) -> Option<&PaytableEntry> {
        self.entries.iter().find(|entry| entry.symbol == symbol)
    }

    pub fn is_wild(&self, symbol: SymbolId) -> bool {
        self.wild == Some(symbol)
    }

    /// Multiplier for `match_count` consecutive `symbol`s, 0 when unpaid.
    pub fn multiplier(&self, symbol: SymbolId, match_count: u8) -> u64 {
        self.entry(symbol)
            .map(|entry| entry.multiplier(match_count))
            .unwrap_or(0)
    }
}

/// One winning payline within a spin outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WinningLine {
    pub payline_index: u8,
    pub symbol: SymbolId,
    pub match_count: u8,
    pub payout: u64,
}

impl Write for WinningLine {
    fn write(&self, writer: &mut impl BufMut) {
        self.payline_index.write(writer);
        self.symbol.write(writer);
        self.match_count.write(writer);
        self.payout.write(writer);
    }
}

impl Read for WinningLine {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            payline_index: u8::read(reader)?,
            symbol: SymbolId::read(reader)?,
            match_count: u8::read(reader)?,
            payout: u64::read(reader)?,
        })
    }
}

impl FixedSize for WinningLine {
    const SIZE: usize = 1 + SymbolId::SIZE + 1 + 8;
}

/// Payout classification relative to the total bet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WinLevel {
    Small = 0,
    Medium = 1,
    Large = 2,
    Jackpot = 3,
}

impl WinLevel {
    /// Classify a payout against a total bet: <5× small, [5,20) medium,
    /// [20,100) large, ≥100× jackpot.
    pub fn classify(total_payout: u64, total_bet: u64) -> Self {
        if total_bet == 0 {
            return Self::Small;
        }
        let payout = total_payout as u128;
        let bet = total_bet as u128;
        if payout >= 100 * bet {
            Self::Jackpot
        } else if payout >= 20 * bet {
            Self::Large
        } else if payout >= 5 * bet {
            Self::Medium
        } else {
            Self::Small
        }
    }
}

impl Write for WinLevel {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for WinLevel {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Small),
            1 => Ok(Self::Medium),
            2 => Ok(Self::Large),
            3 => Ok(Self::Jackpot),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for WinLevel {
    const SIZE: usize = 1;
}

/// The settled result of one spin, immutable once constructed.
///
/// Carries the chain-public inputs (`block_seed`, `bet_key`, `block_number`)
/// so the outcome can be independently re-verified later.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinOutcome {
    pub spin_id: u64,
    pub grid: Grid,
    pub winning_lines: Vec<WinningLine>,
    pub total_payout: u64,
    pub bet_per_line: u64,
    pub paylines: u8,
    pub block_number: u64,
    pub block_seed: BlockSeed,
    pub bet_key: BetKey,
}

impl SpinOutcome {
    pub fn total_bet(&self) -> u64 {
        self.bet_per_line.saturating_mul(self.paylines as u64)
    }

    pub fn is_win(&self) -> bool {
        self.total_payout > 0
    }

    pub fn win_level(&self) -> WinLevel {
        WinLevel::classify(self.total_payout, self.total_bet())
    }
}

impl Write for SpinOutcome {
    fn write(&self, writer: &mut impl BufMut) {
        self.spin_id.write(writer);
        self.grid.write(writer);
        self.winning_lines.write(writer);
        self.total_payout.write(writer);
        self.bet_per_line.write(writer);
        self.paylines.write(writer);
        self.block_number.write(writer);
        self.block_seed.write(writer);
        self.bet_key.write(writer);
    }
}

impl Read for SpinOutcome {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            spin_id: u64::read(reader)?,
            grid: Grid::read(reader)?,
            winning_lines: Vec::<WinningLine>::read_range(reader, 0..=MAX_WINNING_LINES)?,
            total_payout: u64::read(reader)?,
            bet_per_line: u64::read(reader)?,
            paylines: u8::read(reader)?,
            block_number: u64::read(reader)?,
            block_seed: BlockSeed::read(reader)?,
            bet_key: BetKey::read(reader)?,
        })
    }
}

impl EncodeSize for SpinOutcome {
    fn encode_size(&self) -> usize {
        self.spin_id.encode_size()
            + self.grid.encode_size()
            + self.winning_lines.encode_size()
            + self.total_payout.encode_size()
            + self.bet_per_line.encode_size()
            + self.paylines.encode_size()
            + self.block_number.encode_size()
            + self.block_seed.encode_size()
            + self.bet_key.encode_size()
    }
}
