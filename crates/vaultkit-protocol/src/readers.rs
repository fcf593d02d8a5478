//! One reader per get method.
//!
//! Each reader fixes the method name, the argument list it sends, and the
//! exact result schema. Positions map to fields as listed on each function.

use vaultkit_cell::{Address, Coins};

use crate::distribution::ExtraRewardState;
use crate::message::UpgradeSlot;
use crate::stack::{StackReader, StackValue};
use crate::strategy::{PoolType, StrategyConfig};
use crate::vault::VaultConfig;
use crate::Result;

pub const GET_VAULT_DATA: &str = "get_vault_data";
pub const GET_STRATEGY_DATA: &str = "get_strategy_data";
pub const GET_ESTIMATED_LP_OUT: &str = "get_estimated_lp_out";
pub const GET_ESTIMATED_SHARES_OUT: &str = "get_estimated_shares_out";
pub const GET_WALLET_ADDRESS: &str = "get_wallet_address";
pub const GET_EXTRA_REWARD_DATA: &str = "get_extra_reward_data";

/// Decode `get_vault_data`.
///
/// ```text
/// 0  distribution_pool_address  slice
/// 1  shares_total_supply        int
/// 2  deposited_lp               int
/// 3  is_locked                  int (bool)
/// 4  management_fee_rate        int (uint32)
/// 5  management_fee             int
/// 6  deposit_lp_wallet_address  slice (none address or null when unset)
/// 7  admin_address              slice
/// 8  manager_address            slice
/// 9  strategy_address           slice (none address or null when unset)
/// 10 jetton_wallet_code         cell
/// 11 upgrade                    cell
/// ```
pub fn read_vault_data(stack: Vec<StackValue>) -> Result<VaultConfig> {
    let mut r = StackReader::new(GET_VAULT_DATA, stack, 12)?;
    let config = VaultConfig {
        distribution_pool_address: r.read_address()?,
        shares_total_supply: r.read_coins()?,
        deposited_lp: r.read_coins()?,
        is_locked: r.read_bool()?,
        management_fee_rate: r.read_u32()?,
        management_fee: r.read_coins()?,
        deposit_lp_wallet_address: r.read_maybe_address()?,
        admin_address: r.read_address()?,
        manager_address: r.read_address()?,
        strategy_address: r.read_maybe_address()?,
        jetton_wallet_code: r.read_cell()?,
        upgrade: UpgradeSlot::from_cell(&r.read_cell()?)?,
    };
    r.finish()?;
    Ok(config)
}

/// Decode `get_strategy_data`.
///
/// ```text
/// 0 vault_address  1 pool_address  2 pool_type (int)
/// 3 deposit_lp_wallet_address  4 jetton_wallet_address  5 admin_address
/// 6 jetton_vault_address  7 native_vault_address  8 upgrade (cell)
/// ```
pub fn read_strategy_data(stack: Vec<StackValue>) -> Result<StrategyConfig> {
    let mut r = StackReader::new(GET_STRATEGY_DATA, stack, 9)?;
    let config = StrategyConfig {
        vault_address: r.read_address()?,
        pool_address: r.read_address()?,
        pool_type: PoolType::from_bit(r.read_bool()?),
        deposit_lp_wallet_address: r.read_maybe_address()?,
        jetton_wallet_address: r.read_maybe_address()?,
        admin_address: r.read_address()?,
        jetton_vault_address: r.read_address()?,
        native_vault_address: r.read_address()?,
        upgrade: UpgradeSlot::from_cell(&r.read_cell()?)?,
    };
    r.finish()?;
    Ok(config)
}

/// Arguments for `get_estimated_lp_out`.
pub fn estimated_lp_out_args(shares: Coins) -> Result<Vec<StackValue>> {
    Ok(vec![StackValue::coins(shares)?])
}

/// Decode `get_estimated_lp_out`: a single LP amount.
pub fn read_estimated_lp_out(stack: Vec<StackValue>) -> Result<Coins> {
    read_single_amount(GET_ESTIMATED_LP_OUT, stack)
}

/// Arguments for `get_estimated_shares_out`.
pub fn estimated_shares_out_args(lp: Coins) -> Result<Vec<StackValue>> {
    Ok(vec![StackValue::coins(lp)?])
}

/// Decode `get_estimated_shares_out`: a single share amount.
pub fn read_estimated_shares_out(stack: Vec<StackValue>) -> Result<Coins> {
    read_single_amount(GET_ESTIMATED_SHARES_OUT, stack)
}

/// Arguments for `get_wallet_address`: the owner as an address slice.
pub fn wallet_address_args(owner: &Address) -> Result<Vec<StackValue>> {
    Ok(vec![StackValue::address(owner)?])
}

/// Decode `get_wallet_address`.
pub fn read_wallet_address(stack: Vec<StackValue>) -> Result<Address> {
    let mut r = StackReader::new(GET_WALLET_ADDRESS, stack, 1)?;
    let wallet = r.read_address()?;
    r.finish()?;
    Ok(wallet)
}

/// Decode `get_extra_reward_data`: `wallet, funded, distributed`.
pub fn read_extra_reward_data(stack: Vec<StackValue>) -> Result<ExtraRewardState> {
    let mut r = StackReader::new(GET_EXTRA_REWARD_DATA, stack, 3)?;
    let state = ExtraRewardState {
        reward_wallet: r.read_address()?,
        total_funded: r.read_coins()?,
        total_distributed: r.read_coins()?,
    };
    r.finish()?;
    Ok(state)
}

fn read_single_amount(method: &str, stack: Vec<StackValue>) -> Result<Coins> {
    let mut r = StackReader::new(method, stack, 1)?;
    let amount = r.read_coins()?;
    r.finish()?;
    Ok(amount)
}

/// Stack a well-behaved node returns for `get_vault_data`. Used by ledger
/// doubles and gateway tests.
pub fn vault_data_stack(config: &VaultConfig) -> Result<Vec<StackValue>> {
    Ok(vec![
        StackValue::address(&config.distribution_pool_address)?,
        StackValue::coins(config.shares_total_supply)?,
        StackValue::coins(config.deposited_lp)?,
        StackValue::Int(if config.is_locked { -1 } else { 0 }),
        StackValue::Int(i128::from(config.management_fee_rate)),
        StackValue::coins(config.management_fee)?,
        maybe_address(config.deposit_lp_wallet_address.as_ref())?,
        StackValue::address(&config.admin_address)?,
        StackValue::address(&config.manager_address)?,
        maybe_address(config.strategy_address.as_ref())?,
        StackValue::Cell(config.jetton_wallet_code.clone()),
        StackValue::Cell(config.upgrade.to_cell()?),
    ])
}

/// Stack a well-behaved node returns for `get_strategy_data`.
pub fn strategy_data_stack(config: &StrategyConfig) -> Result<Vec<StackValue>> {
    Ok(vec![
        StackValue::address(&config.vault_address)?,
        StackValue::address(&config.pool_address)?,
        StackValue::Int(i128::from(config.pool_type.bit())),
        maybe_address(config.deposit_lp_wallet_address.as_ref())?,
        maybe_address(config.jetton_wallet_address.as_ref())?,
        StackValue::address(&config.admin_address)?,
        StackValue::address(&config.jetton_vault_address)?,
        StackValue::address(&config.native_vault_address)?,
        StackValue::Cell(config.upgrade.to_cell()?),
    ])
}

/// Stack a well-behaved node returns for `get_extra_reward_data`.
pub fn extra_reward_data_stack(state: &ExtraRewardState) -> Result<Vec<StackValue>> {
    Ok(vec![
        StackValue::address(&state.reward_wallet)?,
        StackValue::coins(state.total_funded)?,
        StackValue::coins(state.total_distributed)?,
    ])
}

fn maybe_address(address: Option<&Address>) -> Result<StackValue> {
    match address {
        Some(a) => StackValue::address(a),
        None => Ok(StackValue::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolError;

    #[test]
    fn test_vault_data_reads_back() {
        let config = crate::vault::tests::sample_config();
        let stack = vault_data_stack(&config).expect("stack");
        assert_eq!(stack.len(), 12);
        assert_eq!(read_vault_data(stack).expect("read"), config);
    }

    #[test]
    fn test_vault_data_wrong_arity() {
        let config = crate::vault::tests::sample_config();
        let mut stack = vault_data_stack(&config).expect("stack");
        stack.pop();
        assert!(matches!(
            read_vault_data(stack),
            Err(ProtocolError::StackArity { expected: 12, actual: 11, .. })
        ));
    }

    #[test]
    fn test_vault_data_wrong_type_names_position() {
        let config = crate::vault::tests::sample_config();
        let mut stack = vault_data_stack(&config).expect("stack");
        stack[1] = StackValue::Null;
        let err = read_vault_data(stack).expect_err("type");
        assert_eq!(
            err,
            ProtocolError::StackType {
                method: GET_VAULT_DATA.to_string(),
                position: 1,
                expected: "num",
                found: "null",
            }
        );
    }

    #[test]
    fn test_strategy_data_reads_back() {
        let config = crate::strategy::tests::sample_config();
        let stack = strategy_data_stack(&config).expect("stack");
        assert_eq!(stack.len(), 9);
        assert_eq!(read_strategy_data(stack).expect("read"), config);
    }

    #[test]
    fn test_estimates() {
        assert_eq!(
            estimated_lp_out_args(10).expect("args"),
            vec![StackValue::Int(10)]
        );
        assert_eq!(read_estimated_lp_out(vec![StackValue::Int(20)]).expect("lp"), 20);
        assert_eq!(
            read_estimated_shares_out(vec![StackValue::Int(7)]).expect("shares"),
            7
        );
        assert!(read_estimated_shares_out(vec![StackValue::Int(-7)]).is_err());
        assert!(read_estimated_lp_out(vec![StackValue::Int(1), StackValue::Int(2)]).is_err());
        assert_eq!(estimated_shares_out_args(3).expect("args").len(), 1);
    }

    #[test]
    fn test_wallet_address() {
        let owner = Address::new(0, [1; 32]);
        let wallet = Address::new(0, [2; 32]);
        let args = wallet_address_args(&owner).expect("args");
        assert!(matches!(args.as_slice(), [StackValue::Slice(_)]));
        let stack = vec![StackValue::address(&wallet).expect("slice")];
        assert_eq!(read_wallet_address(stack).expect("read"), wallet);
    }

    #[test]
    fn test_extra_reward_data() {
        let state = ExtraRewardState {
            reward_wallet: Address::new(0, [8; 32]),
            total_funded: 5_000,
            total_distributed: 1_000,
        };
        let stack = extra_reward_data_stack(&state).expect("stack");
        assert_eq!(read_extra_reward_data(stack).expect("read"), state);
    }
}
