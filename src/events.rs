use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use alloy_primitives::{B256, keccak256};

/// Signature of the rollup portal's registration event.
pub const L2_REGISTERED_SIGNATURE: &str = "Registered(Field,Field)";

sol! {
    /// Token portal on the settlement chain.
    event Registered(address indexed token, bytes32 leaf, uint256 index);

    /// Message inbox on the settlement chain.
    event MessageSent(uint256 indexed l2BlockNumber, uint256 index, bytes32 indexed hash, bytes16 rollingHash);

    /// Allow-list governance contract.
    event StatusUpdated(address indexed token, uint8 status);

    function name() external view returns (string);
    function symbol() external view returns (string);
    function decimals() external view returns (uint8);
}

pub fn decode_event<E: SolEvent>(log: &Log) -> anyhow::Result<E> {
    let log_data = log.data();
    let decoded = E::decode_raw_log(log.topics(), &log_data.data)?;
    Ok(decoded)
}

/// Tag in the first field of a rollup portal registration log: the 4-byte
/// selector of [`L2_REGISTERED_SIGNATURE`], left-padded to a field element.
pub fn l2_registered_tag() -> B256 {
    let hash = keccak256(L2_REGISTERED_SIGNATURE.as_bytes());
    B256::left_padding_from(&hash[..4])
}
