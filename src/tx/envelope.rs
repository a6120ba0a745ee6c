//! Transaction envelope composition
//!
//! Builds the protobuf `TxBody`, `AuthInfo` and `SignDoc` for a single-signer,
//! SIGN_MODE_DIRECT transaction. Composition is pure: the same inputs always
//! produce the same bytes.

use crate::chain::AccountState;
use crate::wallet::Fee;
use cosmrs::proto::cosmos::tx::signing::v1beta1::SignMode;
use cosmrs::proto::cosmos::tx::v1beta1::mode_info::{Single, Sum};
use cosmrs::proto::cosmos::tx::v1beta1::{
    AuthInfo, Fee as ProtoFee, ModeInfo, SignDoc, SignerInfo, TxBody, TxRaw,
};
use cosmrs::proto::prost::Message;
use cosmrs::Any;
use sha2::{Digest, Sha256};

/// Inputs to one composition
#[derive(Debug, Clone)]
pub struct ComposeArgs<'a> {
    /// Signer public key, already wrapped with its type URL
    pub public_key: &'a Any,
    pub messages: &'a [Any],
    pub memo: &'a str,
    pub state: AccountState,
    pub chain_id: &'a str,
    /// `None` for the simulation envelope
    pub fee: Option<&'a Fee>,
    pub timeout_block_buffer: u64,
    /// Gas limit of the placeholder fee used when `fee` is `None`
    pub simulation_gas_limit: u64,
}

/// Envelope ready for signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTx {
    pub body_bytes: Vec<u8>,
    pub auth_info_bytes: Vec<u8>,
    /// Encoded `SignDoc`; this is what gets signed
    pub sign_bytes: Vec<u8>,
    pub timeout_height: u64,
}

/// Signed transaction in its wire form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub tx_bytes: Vec<u8>,
    /// Uppercase hex of sha256 over `tx_bytes`
    pub hash: String,
}

/// Compose an unsigned transaction
pub fn compose(args: &ComposeArgs<'_>) -> UnsignedTx {
    let timeout_height = args.state.latest_height + args.timeout_block_buffer;

    let body = TxBody {
        messages: args.messages.to_vec(),
        memo: args.memo.to_string(),
        timeout_height,
        ..Default::default()
    };

    let signer_info = SignerInfo {
        public_key: Some(args.public_key.clone()),
        mode_info: Some(ModeInfo {
            sum: Some(Sum::Single(Single {
                mode: SignMode::Direct as i32,
            })),
        }),
        sequence: args.state.sequence,
    };

    let fee = match args.fee {
        Some(fee) => fee.to_proto(),
        None => ProtoFee {
            amount: vec![],
            gas_limit: args.simulation_gas_limit,
            ..Default::default()
        },
    };

    #[allow(deprecated)]
    let auth_info = AuthInfo {
        signer_infos: vec![signer_info],
        fee: Some(fee),
        ..Default::default()
    };

    let body_bytes = body.encode_to_vec();
    let auth_info_bytes = auth_info.encode_to_vec();

    let sign_doc = SignDoc {
        body_bytes: body_bytes.clone(),
        auth_info_bytes: auth_info_bytes.clone(),
        chain_id: args.chain_id.to_string(),
        account_number: args.state.account_number,
    };

    UnsignedTx {
        body_bytes,
        auth_info_bytes,
        sign_bytes: sign_doc.encode_to_vec(),
        timeout_height,
    }
}

impl UnsignedTx {
    /// Encode as `TxRaw` with the given signature, leaving the envelope usable
    pub fn to_tx_bytes(&self, signature: &[u8]) -> Vec<u8> {
        TxRaw {
            body_bytes: self.body_bytes.clone(),
            auth_info_bytes: self.auth_info_bytes.clone(),
            signatures: vec![signature.to_vec()],
        }
        .encode_to_vec()
    }

    pub fn into_signed(self, signature: &[u8]) -> SignedTx {
        let tx_bytes = TxRaw {
            body_bytes: self.body_bytes,
            auth_info_bytes: self.auth_info_bytes,
            signatures: vec![signature.to_vec()],
        }
        .encode_to_vec();
        SignedTx {
            hash: tx_hash(&tx_bytes),
            tx_bytes,
        }
    }
}

/// Transaction hash as shown by explorers
pub fn tx_hash(tx_bytes: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(tx_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pubkey() -> Any {
        Any {
            type_url: "/cosmos.crypto.secp256k1.PubKey".to_string(),
            value: vec![0x0a, 0x02, 0x01, 0x02],
        }
    }

    fn message() -> Any {
        Any {
            type_url: "/cosmwasm.wasm.v1.MsgExecuteContract".to_string(),
            value: b"payload".to_vec(),
        }
    }

    fn state() -> AccountState {
        AccountState {
            account_number: 42,
            sequence: 7,
            latest_height: 1_000,
        }
    }

    fn fee() -> Fee {
        Fee {
            gas_wanted: 240_000,
            gas_price: "500000000inj".to_string(),
            amount: 120_000_000_000_000,
            denom: "inj".to_string(),
        }
    }

    fn compose_with(fee: Option<&Fee>) -> UnsignedTx {
        let public_key = pubkey();
        let messages = [message()];
        compose(&ComposeArgs {
            public_key: &public_key,
            messages: &messages,
            memo: "ionflux",
            state: state(),
            chain_id: "injective-888",
            fee,
            timeout_block_buffer: 90,
            simulation_gas_limit: 400_000,
        })
    }

    #[test]
    fn test_compose_is_deterministic() {
        assert_eq!(compose_with(None), compose_with(None));
        let fee = fee();
        assert_eq!(compose_with(Some(&fee)), compose_with(Some(&fee)));
    }

    #[test]
    fn test_fee_changes_only_auth_info() {
        let fee = fee();
        let pre = compose_with(None);
        let post = compose_with(Some(&fee));

        assert_eq!(pre.body_bytes, post.body_bytes);
        assert_ne!(pre.auth_info_bytes, post.auth_info_bytes);
        assert_ne!(pre.sign_bytes, post.sign_bytes);
    }

    #[test]
    fn test_timeout_height_and_fields() {
        let fee = fee();
        let unsigned = compose_with(Some(&fee));
        assert_eq!(unsigned.timeout_height, 1_090);

        let body = TxBody::decode(unsigned.body_bytes.as_slice()).unwrap();
        assert_eq!(body.timeout_height, 1_090);
        assert_eq!(body.memo, "ionflux");
        assert_eq!(body.messages, vec![message()]);

        let auth = AuthInfo::decode(unsigned.auth_info_bytes.as_slice()).unwrap();
        assert_eq!(auth.signer_infos[0].sequence, 7);
        let proto_fee = auth.fee.unwrap();
        assert_eq!(proto_fee.gas_limit, 240_000);
        assert_eq!(proto_fee.amount[0].amount, "120000000000000");

        let doc = SignDoc::decode(unsigned.sign_bytes.as_slice()).unwrap();
        assert_eq!(doc.chain_id, "injective-888");
        assert_eq!(doc.account_number, 42);
    }

    #[test]
    fn test_simulation_envelope_uses_placeholder_fee() {
        let unsigned = compose_with(None);
        let auth = AuthInfo::decode(unsigned.auth_info_bytes.as_slice()).unwrap();
        let proto_fee = auth.fee.unwrap();
        assert!(proto_fee.amount.is_empty());
        assert_eq!(proto_fee.gas_limit, 400_000);
    }

    #[test]
    fn test_signed_tx_hash() {
        let signature = [9u8; 64];
        let unsigned = compose_with(None);
        let raw = unsigned.to_tx_bytes(&signature);
        let signed = unsigned.into_signed(&signature);

        assert_eq!(raw, signed.tx_bytes);
        assert_eq!(signed.hash.len(), 64);
        assert_eq!(signed.hash, signed.hash.to_uppercase());
        assert_eq!(signed.hash, tx_hash(&signed.tx_bytes));

        let decoded = TxRaw::decode(signed.tx_bytes.as_slice()).unwrap();
        assert_eq!(decoded.signatures, vec![signature.to_vec()]);
    }
}
