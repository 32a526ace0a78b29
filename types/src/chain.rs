//! Chain-facing types: bet keys, block seeds, and signed bet transactions.
//!
//! The chain itself is an external collaborator; these are the values that
//! cross its boundary. A [`BetKey`] is paired 1:1 with the [`BlockSeed`] of
//! the block that settled the bet, which together make grid reconstruction
//! deterministic for any verifier.

use crate::NAMESPACE;
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use commonware_cryptography::{ed25519, Signer, Verifier};
use commonware_utils::union;
use std::fmt;

/// Length of bet keys, block seeds, and transaction references in bytes.
pub const CHAIN_TOKEN_LEN: usize = 32;

/// Suffix appended to [`NAMESPACE`] when signing bet transactions.
pub const BET_SUFFIX: &[u8] = b"_BET";

#[inline]
pub fn bet_namespace(namespace: &[u8]) -> Vec<u8> {
    union(namespace, BET_SUFFIX)
}

macro_rules! chain_token {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; CHAIN_TOKEN_LEN]);

        impl $name {
            pub fn as_bytes(&self) -> &[u8; CHAIN_TOKEN_LEN] {
                &self.0
            }
        }

        impl From<[u8; CHAIN_TOKEN_LEN]> for $name {
            fn from(bytes: [u8; CHAIN_TOKEN_LEN]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl Write for $name {
            fn write(&self, writer: &mut impl BufMut) {
                writer.put_slice(&self.0);
            }
        }

        impl Read for $name {
            type Cfg = ();

            fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
                if reader.remaining() < CHAIN_TOKEN_LEN {
                    return Err(Error::EndOfBuffer);
                }
                let mut bytes = [0u8; CHAIN_TOKEN_LEN];
                reader.copy_to_slice(&mut bytes);
                Ok(Self(bytes))
            }
        }

        impl FixedSize for $name {
            const SIZE: usize = CHAIN_TOKEN_LEN;
        }
    };
}

chain_token!(
    /// Opaque token binding a placed bet to the randomness that settles it.
    BetKey
);

chain_token!(
    /// Chain-supplied randomness tied to a specific confirmed block.
    BlockSeed
);

chain_token!(
    /// Reference to the chain transaction that carried a bet.
    TxId
);

/// The wager parameters of one spin, before signing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BetOrder {
    pub bet_per_line: u64,
    pub paylines: u8,
}

impl BetOrder {
    pub fn total_bet(&self) -> u64 {
        self.bet_per_line.saturating_mul(self.paylines as u64)
    }
}

impl Write for BetOrder {
    fn write(&self, writer: &mut impl BufMut) {
        self.bet_per_line.write(writer);
        self.paylines.write(writer);
    }
}

impl Read for BetOrder {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            bet_per_line: u64::read(reader)?,
            paylines: u8::read(reader)?,
        })
    }
}

impl FixedSize for BetOrder {
    const SIZE: usize = 8 + 1;
}

/// A signed bet, ready for submission by the chain adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetTransaction {
    pub nonce: u64,
    pub order: BetOrder,

    pub public: ed25519::PublicKey,
    pub signature: ed25519::Signature,
}

impl BetTransaction {
    fn payload(nonce: &u64, order: &BetOrder) -> Vec<u8> {
        let mut payload = Vec::new();
        nonce.write(&mut payload);
        order.write(&mut payload);

        payload
    }

    pub fn sign(private: &ed25519::PrivateKey, nonce: u64, order: BetOrder) -> Self {
        let signature = private.sign(
            &bet_namespace(NAMESPACE),
            &Self::payload(&nonce, &order),
        );

        Self {
            nonce,
            order,
            public: private.public_key(),
            signature,
        }
    }

    pub fn verify(&self) -> bool {
        self.public.verify(
            &bet_namespace(NAMESPACE),
            &Self::payload(&self.nonce, &self.order),
            &self.signature,
        )
    }
}

impl Write for BetTransaction {
    fn write(&self, writer: &mut impl BufMut) {
        self.nonce.write(writer);
        self.order.write(writer);
        self.public.write(writer);
        self.signature.write(writer);
    }
}

impl Read for BetTransaction {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            nonce: u64::read(reader)?,
            order: BetOrder::read(reader)?,
            public: ed25519::PublicKey::read(reader)?,
            signature: ed25519::Signature::read(reader)?,
        })
    }
}

impl EncodeSize for BetTransaction {
    fn encode_size(&self) -> usize {
        self.nonce.encode_size()
            + self.order.encode_size()
            + self.public.encode_size()
            + self.signature.encode_size()
    }
}

/// Acknowledgement that a bet was accepted by the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedBet {
    pub bet_key: BetKey,
    pub tx_id: Option<TxId>,
}

impl Write for SubmittedBet {
    fn write(&self, writer: &mut impl BufMut) {
        self.bet_key.write(writer);
        self.tx_id.write(writer);
    }
}

impl Read for SubmittedBet {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            bet_key: BetKey::read(reader)?,
            tx_id: Option::<TxId>::read(reader)?,
        })
    }
}

impl EncodeSize for SubmittedBet {
    fn encode_size(&self) -> usize {
        self.bet_key.encode_size() + self.tx_id.encode_size()
    }
}

/// The chain's raw report of a settled bet.
///
/// `post_balance` is the authoritative wallet balance after settlement; the
/// engine adopts it verbatim rather than deriving a figure locally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawOutcome {
    pub bet_key: BetKey,
    pub block_seed: BlockSeed,
    pub block_number: u64,
    pub post_balance: u64,
}

impl Write for RawOutcome {
    fn write(&self, writer: &mut impl BufMut) {
        self.bet_key.write(writer);
        self.block_seed.write(writer);
        self.block_number.write(writer);
        self.post_balance.write(writer);
    }
}

impl Read for RawOutcome {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            bet_key: BetKey::read(reader)?,
            block_seed: BlockSeed::read(reader)?,
            block_number: u64::read(reader)?,
            post_balance: u64::read(reader)?,
        })
    }
}

impl FixedSize for RawOutcome {
    const SIZE: usize = BetKey::SIZE + BlockSeed::SIZE + 8 + 8;
}
