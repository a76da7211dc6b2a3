use alloy::sol_types::SolCall;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use tracing::debug;

use crate::events::{decimalsCall, nameCall, symbolCall};
use crate::rpc::EvmClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

async fn call_contract<C, T>(client: &C, address: Address, call: T) -> Result<T::Return>
where
    C: EvmClient + ?Sized,
    T: SolCall + Send,
{
    let output = client.call(address, call.abi_encode().into()).await?;
    T::abi_decode_returns(&output)
        .with_context(|| format!("Failed to decode {} from {:?}", T::SIGNATURE, address))
}

/// Resolves name, symbol and decimals of a token; the three reads run concurrently.
pub async fn fetch_token_metadata<C>(client: &C, address: Address) -> Result<TokenMetadata>
where
    C: EvmClient + ?Sized,
{
    let (name, symbol, decimals) = tokio::try_join!(
        call_contract(client, address, nameCall {}),
        call_contract(client, address, symbolCall {}),
        call_contract(client, address, decimalsCall {}),
    )?;

    debug!(
        "Resolved metadata for {:?}: {} ({}), {} decimals",
        address, name, symbol, decimals
    );

    Ok(TokenMetadata {
        name,
        symbol,
        decimals,
    })
}
