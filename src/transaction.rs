//! Foreign-chain Transaction Envelopes
//!
//! Builds typed value-transfer transactions (EIP-2718 type 0x01 and 0x02),
//! computes the digest handed to the signer and produces the raw signed bytes
//! that are broadcast. Integers are RLP-encoded as minimal big-endian strings.

use rlp::RlpStream;
use serde::{Deserialize, Serialize};

use crate::types::{keccak256, Address, FeeSnapshot, Hash, Wei};

const EIP2930_TX_TYPE: u8 = 0x01;
const EIP1559_TX_TYPE: u8 = 0x02;

/// Type-2 value transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: Wei,
    pub max_fee_per_gas: Wei,
    pub gas_limit: u64,
    pub destination: Address,
    pub amount: Wei,
}

/// Type-1 value transfer with an empty access list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip2930Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: Wei,
    pub gas_limit: u64,
    pub destination: Address,
    pub amount: Wei,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsignedTransaction {
    Eip1559(Eip1559Transaction),
    Eip2930(Eip2930Transaction),
}

impl UnsignedTransaction {
    /// Build a transfer priced with `fee`
    pub fn transfer(
        fee: &FeeSnapshot,
        chain_id: u64,
        nonce: u64,
        destination: Address,
        amount: Wei,
    ) -> Self {
        match fee {
            FeeSnapshot::Eip1559(fee) => Self::Eip1559(Eip1559Transaction {
                chain_id,
                nonce,
                max_priority_fee_per_gas: fee.priority_fee,
                max_fee_per_gas: fee.max_fee,
                gas_limit: fee.gas_limit,
                destination,
                amount,
            }),
            FeeSnapshot::Eip2930(fee) => Self::Eip2930(Eip2930Transaction {
                chain_id,
                nonce,
                gas_price: fee.gas_price,
                gas_limit: fee.gas_limit,
                destination,
                amount,
            }),
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            Self::Eip1559(tx) => tx.nonce,
            Self::Eip2930(tx) => tx.nonce,
        }
    }

    pub fn amount(&self) -> Wei {
        match self {
            Self::Eip1559(tx) => tx.amount,
            Self::Eip2930(tx) => tx.amount,
        }
    }

    pub fn destination(&self) -> Address {
        match self {
            Self::Eip1559(tx) => tx.destination,
            Self::Eip2930(tx) => tx.destination,
        }
    }

    pub fn tx_type(&self) -> u8 {
        match self {
            Self::Eip1559(_) => EIP1559_TX_TYPE,
            Self::Eip2930(_) => EIP2930_TX_TYPE,
        }
    }

    fn field_count(&self) -> usize {
        match self {
            Self::Eip1559(_) => 9,
            Self::Eip2930(_) => 8,
        }
    }

    fn append_fields(&self, stream: &mut RlpStream) {
        match self {
            Self::Eip1559(tx) => {
                append_quantity(stream, tx.chain_id as u128);
                append_quantity(stream, tx.nonce as u128);
                append_quantity(stream, tx.max_priority_fee_per_gas);
                append_quantity(stream, tx.max_fee_per_gas);
                append_quantity(stream, tx.gas_limit as u128);
                stream.append(&tx.destination.as_bytes().to_vec());
                append_quantity(stream, tx.amount);
                stream.append_empty_data();
                stream.begin_list(0);
            }
            Self::Eip2930(tx) => {
                append_quantity(stream, tx.chain_id as u128);
                append_quantity(stream, tx.nonce as u128);
                append_quantity(stream, tx.gas_price);
                append_quantity(stream, tx.gas_limit as u128);
                stream.append(&tx.destination.as_bytes().to_vec());
                append_quantity(stream, tx.amount);
                stream.append_empty_data();
                stream.begin_list(0);
            }
        }
    }

    /// `type || rlp(fields)`
    pub fn encode_unsigned(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(self.field_count());
        self.append_fields(&mut stream);
        typed(self.tx_type(), &stream.out())
    }

    /// Digest to be signed
    pub fn digest(&self) -> [u8; 32] {
        keccak256(&self.encode_unsigned())
    }

    /// Attach a signature and produce the broadcastable form
    pub fn into_signed(self, signature: RecoverableSignature) -> SignedTransaction {
        let mut stream = RlpStream::new_list(self.field_count() + 3);
        self.append_fields(&mut stream);
        append_quantity(&mut stream, signature.y_parity as u128);
        stream.append(&trim_leading_zeros(&signature.r));
        stream.append(&trim_leading_zeros(&signature.s));

        let raw = typed(self.tx_type(), &stream.out());
        let hash = Hash::new(keccak256(&raw));

        SignedTransaction {
            transaction: self,
            signature,
            raw_transaction: format!("0x{}", hex::encode(&raw)),
            hash,
        }
    }
}

/// ECDSA signature with the y-parity needed for sender recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverableSignature {
    #[serde(with = "hex_array")]
    pub r: [u8; 32],
    #[serde(with = "hex_array")]
    pub s: [u8; 32],
    pub y_parity: bool,
}

/// A signed transaction ready for broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: UnsignedTransaction,
    pub signature: RecoverableSignature,
    /// `0x`-prefixed hex of the typed envelope
    pub raw_transaction: String,
    pub hash: Hash,
}

impl SignedTransaction {
    pub fn nonce(&self) -> u64 {
        self.transaction.nonce()
    }
}

fn append_quantity(stream: &mut RlpStream, value: u128) {
    stream.append(&trim_leading_zeros(&value.to_be_bytes()));
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

fn typed(tx_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 1);
    out.push(tx_type);
    out.extend_from_slice(payload);
    out
}

mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        crate::types::hash::decode_fixed::<32>(&s).map_err(serde::de::Error::custom)
    }
}
