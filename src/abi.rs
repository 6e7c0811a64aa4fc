use alloy::sol;
use alloy::sol_types::SolCall;
use alloy_primitives::Bytes;

use crate::verifier::{CallOutcome, FieldValue, TokenField};

sol! {
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Call3Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Call3Result[] memory returnData);
    }
}

sol! {
    interface IERC20Metadata {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function name() external view returns (string);
    }

    interface IERC20Bytes32Metadata {
        function symbol() external view returns (bytes32);
        function name() external view returns (bytes32);
    }
}

pub fn encode_call(field: TokenField) -> Bytes {
    match field {
        TokenField::Decimals => IERC20Metadata::decimalsCall {}.abi_encode().into(),
        TokenField::Symbol => IERC20Metadata::symbolCall {}.abi_encode().into(),
        TokenField::Name => IERC20Metadata::nameCall {}.abi_encode().into(),
    }
}

/// Decodes the return data of a successful call. Empty data is a successful
/// call with nothing in it, which is not the same as a failure.
pub fn decode_field(field: TokenField, data: &[u8]) -> CallOutcome {
    if data.is_empty() {
        return CallOutcome::Success(None);
    }

    match field {
        TokenField::Decimals => match IERC20Metadata::decimalsCall::abi_decode_returns(data) {
            Ok(decimals) => CallOutcome::Success(Some(FieldValue::Decimals(decimals))),
            Err(e) => CallOutcome::Failure(format!("decimals: {e}")),
        },
        TokenField::Symbol => decode_text(
            IERC20Metadata::symbolCall::abi_decode_returns(data).ok(),
            IERC20Bytes32Metadata::symbolCall::abi_decode_returns(data).ok(),
            "symbol",
        ),
        TokenField::Name => decode_text(
            IERC20Metadata::nameCall::abi_decode_returns(data).ok(),
            IERC20Bytes32Metadata::nameCall::abi_decode_returns(data).ok(),
            "name",
        ),
    }
}

// Legacy tokens (MKR, SAI) return a zero-padded bytes32 instead of a string.
fn decode_text(
    as_string: Option<String>,
    as_bytes32: Option<alloy_primitives::B256>,
    label: &str,
) -> CallOutcome {
    if let Some(text) = as_string {
        return CallOutcome::Success(Some(FieldValue::Text(text)));
    }

    if let Some(word) = as_bytes32 {
        let end = word.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        if let Ok(text) = std::str::from_utf8(&word[..end]) {
            return CallOutcome::Success(Some(FieldValue::Text(text.to_string())));
        }
    }

    CallOutcome::Failure(format!("{label}: return data is neither string nor bytes32"))
}
