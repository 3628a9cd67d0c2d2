//! ABI bindings for the hub and target contracts.

use alloy::sol;

sol! {
    /// The hub's `Forward` struct. Field order is part of the signed EIP-712
    /// type and of the `execute` calldata.
    #[derive(Debug, PartialEq, Eq)]
    struct Forward {
        address from;
        address to;
        uint256 value;
        uint32 space;
        uint256 nonce;
        uint256 deadline;
        bytes32 dataHash;
        address caller;
    }

    /// Forwarding hub: verifies the signature and replay-protects on-chain.
    interface IForwardHub {
        function execute(Forward forward, bytes callData, bytes signature) external payable;
        function isNonceUsed(address user, uint32 space, uint256 nonce) external view returns (bool);
    }

    /// One-shot target: `minted(account)` is the completion flag.
    interface IForwardTarget {
        function minted(address account) external view returns (bool);
    }
}
