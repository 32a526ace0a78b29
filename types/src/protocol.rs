//! Cross-boundary message protocol between a game surface and the host.
//!
//! Every inbound frame is decoded structurally before any field is trusted:
//! unknown tags, oversized fields, and truncated buffers are all rejected at
//! this layer, so malformed traffic never reaches the engine. Outbound
//! events are independent pushes; one request does not imply exactly one
//! response.

use crate::codec::{read_string, string_encode_size, write_string};
use crate::config::{GameConfig, MAX_CONTRACT_ID_LENGTH};
use crate::chain::TxId;
use crate::slots::{Grid, WinLevel, WinningLine, MAX_WINNING_LINES};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, ReadRangeExt, Write};

/// Maximum error-message length accepted on the wire.
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 256;

/// Requests a game surface may send to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// Bind the surface to the host and request an initial state push.
    /// Binary: [0] [hasContract:u8] [contractLen:u32 BE] [contractBytes...]
    Init { contract_id: Option<String> },

    /// Place a spin. The outcome arrives later as an [`Event::Outcome`] push.
    /// Binary: [1] [paylines:u8] [betPerLine:u64 BE] [hasRequestId:u8] [requestId:u64 BE]
    SpinRequest {
        paylines: u8,
        bet_per_line: u64,
        request_id: Option<u64>,
    },

    /// Ask for an authoritative balance refresh.
    /// Binary: [2]
    GetBalance,

    /// Ask for the static game configuration.
    /// Binary: [3]
    GetConfig,
}

impl Write for Request {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Init { contract_id } => {
                0u8.write(writer);
                contract_id.is_some().write(writer);
                if let Some(contract_id) = contract_id {
                    write_string(contract_id, writer);
                }
            }
            Self::SpinRequest {
                paylines,
                bet_per_line,
                request_id,
            } => {
                1u8.write(writer);
                paylines.write(writer);
                bet_per_line.write(writer);
                request_id.write(writer);
            }
            Self::GetBalance => {
                2u8.write(writer);
            }
            Self::GetConfig => {
                3u8.write(writer);
            }
        }
    }
}

impl Read for Request {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let tag = u8::read(reader)?;
        match tag {
            0 => {
                let contract_id = if bool::read(reader)? {
                    Some(read_string(reader, MAX_CONTRACT_ID_LENGTH)?)
                } else {
                    None
                };
                Ok(Self::Init { contract_id })
            }
            1 => Ok(Self::SpinRequest {
                paylines: u8::read(reader)?,
                bet_per_line: u64::read(reader)?,
                request_id: Option::<u64>::read(reader)?,
            }),
            2 => Ok(Self::GetBalance),
            3 => Ok(Self::GetConfig),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl EncodeSize for Request {
    fn encode_size(&self) -> usize {
        1 + match self {
            Self::Init { contract_id } => {
                1 + contract_id
                    .as_deref()
                    .map(string_encode_size)
                    .unwrap_or(0)
            }
            Self::SpinRequest { request_id, .. } => 1 + 8 + request_id.encode_size(),
            Self::GetBalance => 0,
            Self::GetConfig => 0,
        }
    }
}

/// Stable error codes crossing the trust boundary.
///
/// `recoverable` tells the surface whether the session remains usable; no
/// internal detail beyond the code and message ever crosses the boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    InitFailed = 0,
    UnauthorizedOrigin = 1,
    InvalidMessage = 2,
    InvalidRequest = 3,
    NotInitialized = 4,
    RateLimit = 5,
    InsufficientBalance = 6,
    AlreadySpinning = 7,
    SpinFailed = 8,
    MessageHandlerError = 9,
}

impl ErrorCode {
    pub fn recoverable(&self) -> bool {
        !matches!(
            self,
            Self::InitFailed | Self::UnauthorizedOrigin | Self::NotInitialized
        )
    }
}

impl Write for ErrorCode {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for ErrorCode {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::InitFailed),
            1 => Ok(Self::UnauthorizedOrigin),
            2 => Ok(Self::InvalidMessage),
            3 => Ok(Self::InvalidRequest),
            4 => Ok(Self::NotInitialized),
            5 => Ok(Self::RateLimit),
            6 => Ok(Self::InsufficientBalance),
            7 => Ok(Self::AlreadySpinning),
            8 => Ok(Self::SpinFailed),
            9 => Ok(Self::MessageHandlerError),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for ErrorCode {
    const SIZE: usize = 1;
}

/// The outcome push sent to the game surface when a spin settles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub spin_id: u64,
    pub grid: Grid,
    pub winnings: u64,
    pub is_win: bool,
    pub winning_lines: Vec<WinningLine>,
    pub win_level: WinLevel,
    pub bet_per_line: u64,
    pub paylines: u8,
    pub total_bet: u64,
}

impl Write for Outcome {
    fn write(&self, writer: &mut impl BufMut) {
        self.spin_id.write(writer);
        self.grid.write(writer);
        self.winnings.write(writer);
        self.is_win.write(writer);
        self.winning_lines.write(writer);
        self.win_level.write(writer);
        self.bet_per_line.write(writer);
        self.paylines.write(writer);
        self.total_bet.write(writer);
    }
}

impl Read for Outcome {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            spin_id: u64::read(reader)?,
            grid: Grid::read(reader)?,
            winnings: u64::read(reader)?,
            is_win: bool::read(reader)?,
            winning_lines: Vec::<WinningLine>::read_range(reader, 0..=MAX_WINNING_LINES)?,
            win_level: WinLevel::read(reader)?,
            bet_per_line: u64::read(reader)?,
            paylines: u8::read(reader)?,
            total_bet: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Outcome {
    fn encode_size(&self) -> usize {
        self.spin_id.encode_size()
            + self.grid.encode_size()
            + self.winnings.encode_size()
            + self.is_win.encode_size()
            + self.winning_lines.encode_size()
            + self.win_level.encode_size()
            + self.bet_per_line.encode_size()
            + self.paylines.encode_size()
            + self.total_bet.encode_size()
    }
}

/// The static configuration summary pushed to the game surface.
///
/// Also served as JSON from the bridge's HTTP surface, hence the serde
/// derives alongside the codec impls.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConfigSummary {
    pub contract_id: String,
    pub min_bet: u64,
    pub max_bet: u64,
    pub max_paylines: u8,
    pub rtp_target_bps: u16,
    pub house_edge_bps: u16,
}

impl From<&GameConfig> for ConfigSummary {
    fn from(config: &GameConfig) -> Self {
        Self {
            contract_id: config.contract_id.clone(),
            min_bet: config.min_bet,
            max_bet: config.max_bet,
            max_paylines: config.max_paylines,
            rtp_target_bps: config.rtp_target_bps,
            house_edge_bps: config.house_edge_bps,
        }
    }
}

impl Write for ConfigSummary {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.contract_id, writer);
        self.min_bet.write(writer);
        self.max_bet.write(writer);
        self.max_paylines.write(writer);
        self.rtp_target_bps.write(writer);
        self.house_edge_bps.write(writer);
    }
}

impl Read for ConfigSummary {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            contract_id: read_string(reader, MAX_CONTRACT_ID_LENGTH)?,
            min_bet: u64::read(reader)?,
            max_bet: u64::read(reader)?,
            max_paylines: u8::read(reader)?,
            rtp_target_bps: u16::read(reader)?,
            house_edge_bps: u16::read(reader)?,
        })
    }
}

impl EncodeSize for ConfigSummary {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.contract_id)
            + self.min_bet.encode_size()
            + self.max_bet.encode_size()
            + self.max_paylines.encode_size()
            + self.rtp_target_bps.encode_size()
            + self.house_edge_bps.encode_size()
    }
}

/// Events the host pushes to the game surface.
///
/// `BalanceUpdate` and `BalanceResponse` carry the same payload; the former
/// is an unsolicited push, the latter answers a `GetBalance`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Outcome(Outcome),

    BalanceUpdate {
        balance: u64,
        available_balance: u64,
    },

    BalanceResponse {
        balance: u64,
        available_balance: u64,
    },

    Config(ConfigSummary),

    /// The bet reached the chain; carries the transaction reference once
    /// available.
    SpinSubmitted {
        spin_id: u64,
        tx_id: Option<TxId>,
    },

    Error {
        code: ErrorCode,
        message: String,
        recoverable: bool,
        request_id: Option<u64>,
    },
}

impl Event {
    /// Build an error event; `recoverable` always mirrors the code.
    pub fn error(code: ErrorCode, message: impl Into<String>, request_id: Option<u64>) -> Self {
        Self::Error {
            code,
            message: message.into(),
            recoverable: code.recoverable(),
            request_id,
        }
    }
}

impl Write for Event {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Outcome(outcome) => {
                0u8.write(writer);
                outcome.write(writer);
            }
            Self::BalanceUpdate {
                balance,
                available_balance,
            } => {
                1u8.write(writer);
                balance.write(writer);
                available_balance.write(writer);
            }
            Self::BalanceResponse {
                balance,
                available_balance,
            } => {
                2u8.write(writer);
                balance.write(writer);
                available_balance.write(writer);
            }
            Self::Config(summary) => {
                3u8.write(writer);
                summary.write(writer);
            }
            Self::SpinSubmitted { spin_id, tx_id } => {
                4u8.write(writer);
                spin_id.write(writer);
                tx_id.write(writer);
            }
            Self::Error {
                code,
                message,
                recoverable,
                request_id,
            } => {
                5u8.write(writer);
                code.write(writer);
                write_string(message, writer);
                recoverable.write(writer);
                request_id.write(writer);
            }
        }
    }
}

impl Read for Event {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let tag = u8::read(reader)?;
        match tag {
            0 => Ok(Self::Outcome(Outcome::read(reader)?)),
            1 => Ok(Self::BalanceUpdate {
                balance: u64::read(reader)?,
                available_balance: u64::read(reader)?,
            }),
            2 => Ok(Self::BalanceResponse {
                balance: u64::read(reader)?,
                available_balance: u64::read(reader)?,
            }),
            3 => Ok(Self::Config(ConfigSummary::read(reader)?)),
            4 => Ok(Self::SpinSubmitted {
                spin_id: u64::read(reader)?,
                tx_id: Option::<TxId>::read(reader)?,
            }),
            5 => Ok(Self::Error {
                code: ErrorCode::read(reader)?,
                message: read_string(reader, MAX_ERROR_MESSAGE_LENGTH)?,
                recoverable: bool::read(reader)?,
                request_id: Option::<u64>::read(reader)?,
            }),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl EncodeSize for Event {
    fn encode_size(&self) -> usize {
        1 + match self {
            Self::Outcome(outcome) => outcome.encode_size(),
            Self::BalanceUpdate { .. } => 8 + 8,
            Self::BalanceResponse { .. } => 8 + 8,
            Self::Config(summary) => summary.encode_size(),
            Self::SpinSubmitted { spin_id, tx_id } => {
                spin_id.encode_size() + tx_id.encode_size()
            }
            Self::Error {
                message,
                request_id,
                ..
            } => ErrorCode::SIZE + string_encode_size(message) + 1 + request_id.encode_size(),
        }
    }
}
