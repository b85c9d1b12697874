//! ABI bindings for the intent gateway contract.
//!
//! Generated via Alloy's `sol!` macro from the Solidity event
//! definitions. The canonical ABI JSON ships alongside the bindings and
//! parameterizes the [`crate::ingest::decoder::EventDecoder`] at
//! construction, which cross-checks the JSON selectors against the
//! compiled signature hashes.

pub mod intent_gateway;

/// Canonical ABI JSON for the intent gateway events.
///
/// Passed to the decoder at construction; deployments can substitute
/// their own ABI text as long as the six event schemas are present.
pub const INTENT_GATEWAY_ABI: &str = include_str!("IntentGateway.json");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_json_parses() {
        let abi: alloy::json_abi::JsonAbi =
            serde_json::from_str(INTENT_GATEWAY_ABI).expect("embedded ABI must be valid");
        assert_eq!(abi.events.len(), 6);
    }

    #[test]
    fn abi_json_selectors_match_bindings() {
        use alloy::sol_types::SolEvent;

        let abi: alloy::json_abi::JsonAbi =
            serde_json::from_str(INTENT_GATEWAY_ABI).expect("embedded ABI must be valid");

        let selector_of = |name: &str| {
            abi.events
                .get(name)
                .and_then(|overloads| overloads.first())
                .map(alloy::json_abi::Event::selector)
                .expect("event present in ABI")
        };

        assert_eq!(
            selector_of("IntentInitiated"),
            intent_gateway::IntentInitiated::SIGNATURE_HASH
        );
        assert_eq!(
            selector_of("IntentInitiatedWithCall"),
            intent_gateway::IntentInitiatedWithCall::SIGNATURE_HASH
        );
        assert_eq!(
            selector_of("IntentFulfilled"),
            intent_gateway::IntentFulfilled::SIGNATURE_HASH
        );
        assert_eq!(
            selector_of("IntentFulfilledWithCall"),
            intent_gateway::IntentFulfilledWithCall::SIGNATURE_HASH
        );
        assert_eq!(
            selector_of("IntentSettled"),
            intent_gateway::IntentSettled::SIGNATURE_HASH
        );
        assert_eq!(
            selector_of("IntentSettledWithCall"),
            intent_gateway::IntentSettledWithCall::SIGNATURE_HASH
        );
    }
}
