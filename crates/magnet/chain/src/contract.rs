//! Magnet mining contract bindings

#![allow(missing_docs)]

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;

/// Mining contract deployed on the Magnet network
pub const MAGNET_MINING_CONTRACT: Address = address!("0x51e0ab7f7db4a2bf4500dfa59f7a4957afc8c02e");

/// Chain id of the Magnet network
pub const MAGNET_CHAIN_ID: u64 = 114514;

sol! {
    /// Subset of the mining contract used by the client.
    #[sol(rpc)]
    interface MiningContract {
        event MiningReward(address indexed user, uint256 reward);
        event NewMiningTask(address indexed user, uint256 difficulty);

        function requestMiningTask() external;
        function submitMiningResult(uint256 solution) external;
        function getMyTask() external view returns (uint256 nonce, uint256 difficulty, bool active);
        function getContractBalance() external view returns (uint256);
        function FREE_REWARD() external view returns (uint256);
    }
}
