//! Integration test: vault and strategy proxies over the in-memory ledger.
//!
//! Each proxy call is checked at the ledger boundary: destination, attached
//! value, bounce flag, and the body's header and fields.

use vaultkit_cell::{Address, Cell, CellBuilder};
use vaultkit_client::confirm::{ConfirmationTracker, RetryPolicy};
use vaultkit_client::session::{Session, Submitter};
use vaultkit_client::strategy::StrategyContract;
use vaultkit_client::vault::VaultContract;
use vaultkit_client::ClientError;
use vaultkit_integration_tests::{addr, MockLedger};
use vaultkit_protocol::exit_codes::ExitCode;
use vaultkit_protocol::jetton::{DepositOptions, WithdrawOptions};
use vaultkit_protocol::message::UpgradeSlot;
use vaultkit_protocol::opcodes::{read_header, Opcode};
use vaultkit_protocol::readers;
use vaultkit_protocol::stack::StackValue;
use vaultkit_protocol::strategy::{self, PoolType, StrategyConfig};
use vaultkit_protocol::vault::{
    SetAddressOptions, SetManagementFeeRateOptions, VaultConfig, WithdrawManagementFeeOptions,
    ADMIN_OP_VALUE, DEFAULT_MANAGEMENT_FEE_PRECISION,
};
use vaultkit_protocol::ProtocolError;

fn code(tag: u16) -> Cell {
    let mut b = CellBuilder::new();
    b.store_uint(u128::from(tag), 16).expect("store");
    b.seal()
}

fn vault_config() -> VaultConfig {
    VaultConfig {
        distribution_pool_address: addr(1),
        shares_total_supply: 1_000_000,
        deposited_lp: 1_000_000,
        is_locked: false,
        management_fee_rate: 200,
        management_fee: 5_000,
        deposit_lp_wallet_address: None,
        admin_address: addr(2),
        manager_address: addr(3),
        strategy_address: None,
        jetton_wallet_code: code(0xC0DE),
        upgrade: UpgradeSlot::default(),
    }
}

fn admin() -> Session {
    Session::new(addr(2), "admin")
}

fn tracker() -> ConfirmationTracker {
    ConfirmationTracker::new(RetryPolicy::default()).expect("policy")
}

#[tokio::test(start_paused = true)]
async fn vault_deploy_carries_state_init() {
    let ledger = MockLedger::new();
    let session = admin();
    let tracker = tracker();
    let via = Submitter::new(&ledger, &session, &tracker);

    let vault = VaultContract::from_init(code(0x1111), vault_config(), 0).expect("init");
    vault.send_deploy(&via, Some(7), None).await.expect("deploy");

    let subs = ledger.submissions();
    assert_eq!(subs.len(), 1);
    let msg = &subs[0].message;
    assert_eq!(msg.to, *vault.address());
    assert!(!msg.bounce);
    let init = msg.state_init.as_ref().expect("state init");
    assert_eq!(init.address(0).expect("address"), *vault.address());
    assert_eq!(
        VaultConfig::from_cell(&init.data).expect("data"),
        vault_config()
    );
    let header = read_header(&msg.body).expect("header");
    assert_eq!(header.op, Opcode::Init);
    assert_eq!(header.query_id, 7);
}

#[tokio::test(start_paused = true)]
async fn deploy_without_init_is_refused() {
    let ledger = MockLedger::new();
    let session = admin();
    let tracker = tracker();
    let via = Submitter::new(&ledger, &session, &tracker);

    let vault = VaultContract::from_address(addr(9));
    let err = vault.send_deploy(&via, None, None).await.expect_err("no init");
    assert!(matches!(err, ClientError::MissingStateInit(_)));
    assert!(ledger.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn admin_setters_reach_the_vault() {
    let ledger = MockLedger::new();
    let session = admin();
    let tracker = tracker();
    let via = Submitter::new(&ledger, &session, &tracker);
    let vault = VaultContract::from_address(addr(9));

    vault
        .send_set_strategy_address(
            &via,
            SetAddressOptions {
                address: addr(4),
                query_id: None,
                value: None,
            },
        )
        .await
        .expect("set strategy");
    vault
        .send_set_management_fee_rate(
            &via,
            SetManagementFeeRateOptions {
                rate: 300,
                precision: DEFAULT_MANAGEMENT_FEE_PRECISION,
                query_id: Some(1),
                value: None,
            },
        )
        .await
        .expect("set fee rate");

    let subs = ledger.submissions();
    assert_eq!(subs.len(), 2);
    assert!(subs.iter().all(|s| s.message.to == addr(9) && s.message.bounce));
    assert_eq!(subs[0].message.value, ADMIN_OP_VALUE);

    let mut s = subs[0].message.body.parse();
    assert_eq!(s.load_uint(32).expect("op") as u32, Opcode::SetStrategyAddress.code());
    assert_eq!(s.load_uint(64).expect("qid"), 0);
    assert_eq!(s.load_address().expect("address"), addr(4));

    let header = read_header(&subs[1].message.body).expect("header");
    assert_eq!(header.op, Opcode::SetManagementFeeRate);
    assert_eq!(header.query_id, 1);
}

#[tokio::test(start_paused = true)]
async fn fee_rate_above_precision_never_leaves_the_client() {
    let ledger = MockLedger::new();
    let session = admin();
    let tracker = tracker();
    let via = Submitter::new(&ledger, &session, &tracker);
    let vault = VaultContract::from_address(addr(9));

    let err = vault
        .send_set_management_fee_rate(
            &via,
            SetManagementFeeRateOptions {
                rate: DEFAULT_MANAGEMENT_FEE_PRECISION + 1,
                precision: DEFAULT_MANAGEMENT_FEE_PRECISION,
                query_id: None,
                value: None,
            },
        )
        .await
        .expect_err("out of bounds");
    assert_eq!(
        err,
        ClientError::Protocol(ProtocolError::WouldReject(ExitCode::FeeRateOutOfBounds))
    );
    assert!(ledger.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn management_fee_withdrawal_checks_accrued_fee() {
    let ledger = MockLedger::new();
    ledger.set_vault(addr(9), &vault_config());
    let session = Session::new(addr(3), "manager");
    let tracker = tracker();
    let via = Submitter::new(&ledger, &session, &tracker);
    let vault = VaultContract::from_address(addr(9));

    let err = vault
        .send_withdraw_management_fee(
            &via,
            WithdrawManagementFeeOptions {
                amount: 5_001,
                destination: addr(3),
                query_id: None,
                value: None,
            },
        )
        .await
        .expect_err("more than accrued");
    assert_eq!(
        err,
        ClientError::Protocol(ProtocolError::WouldReject(ExitCode::InsufficientManagementFee))
    );
    assert!(ledger.submissions().is_empty());

    vault
        .send_withdraw_management_fee(
            &via,
            WithdrawManagementFeeOptions {
                amount: 5_000,
                destination: addr(3),
                query_id: None,
                value: None,
            },
        )
        .await
        .expect("withdraw fee");
    let subs = ledger.submissions();
    assert_eq!(subs.len(), 1);
    let header = read_header(&subs[0].message.body).expect("header");
    assert_eq!(header.op, Opcode::WithdrawManagementFee);
}

#[tokio::test(start_paused = true)]
async fn deposit_goes_through_the_depositor_lp_wallet() {
    let ledger = MockLedger::new();
    let session = Session::new(addr(0x50), "depositor");
    let tracker = tracker();
    let via = Submitter::new(&ledger, &session, &tracker);
    let vault = VaultContract::from_address(addr(9));

    vault
        .send_deposit(
            &via,
            &addr(0x51),
            DepositOptions {
                amount: 1_000,
                vault: Address::new(0, [0; 32]),
                response_destination: addr(0x50),
                forward_ton_amount: None,
                query_id: Some(3),
                value: None,
            },
        )
        .await
        .expect("deposit");

    let subs = ledger.submissions();
    assert_eq!(subs[0].message.to, addr(0x51));
    let mut s = subs[0].message.body.parse();
    assert_eq!(s.load_uint(32).expect("op") as u32, Opcode::Transfer.code());
    assert_eq!(s.load_uint(64).expect("qid"), 3);
    assert_eq!(s.load_coins().expect("amount"), 1_000);
    // The proxy fills in the vault as the transfer destination.
    assert_eq!(s.load_address().expect("destination"), addr(9));
}

#[tokio::test(start_paused = true)]
async fn withdraw_resolves_the_share_wallet() {
    let ledger = MockLedger::new();
    let owner = addr(0x50);
    let share_wallet = addr(0x52);
    ledger.set_stack(
        addr(9),
        readers::GET_WALLET_ADDRESS,
        vec![StackValue::address(&share_wallet).expect("slice")],
    );
    let session = Session::new(owner, "holder");
    let tracker = tracker();
    let via = Submitter::new(&ledger, &session, &tracker);
    let vault = VaultContract::from_address(addr(9));

    vault
        .send_withdraw(
            &via,
            WithdrawOptions {
                shares: 250,
                response_destination: owner,
                query_id: None,
                value: None,
            },
        )
        .await
        .expect("withdraw");

    let calls = ledger.get_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, readers::GET_WALLET_ADDRESS);
    assert_eq!(
        calls[0].args,
        readers::wallet_address_args(&owner).expect("args")
    );

    let subs = ledger.submissions();
    assert_eq!(subs[0].message.to, share_wallet);
    let header = read_header(&subs[0].message.body).expect("header");
    assert_eq!(header.op, Opcode::Withdraw);
}

#[tokio::test(start_paused = true)]
async fn vault_estimates_and_state() {
    let ledger = MockLedger::new();
    ledger.set_vault(addr(9), &vault_config());
    ledger.set_stack(
        addr(9),
        readers::GET_ESTIMATED_LP_OUT,
        vec![StackValue::Int(2_000)],
    );
    ledger.set_stack(
        addr(9),
        readers::GET_ESTIMATED_SHARES_OUT,
        vec![StackValue::Int(500)],
    );
    let vault = VaultContract::from_address(addr(9));

    assert_eq!(vault.get_vault_data(&ledger).await.expect("state"), vault_config());
    assert_eq!(vault.get_estimated_lp_out(&ledger, 1_000).await.expect("lp"), 2_000);
    assert_eq!(vault.get_estimated_shares_out(&ledger, 1_000).await.expect("shares"), 500);

    let calls = ledger.get_calls();
    assert_eq!(calls[1].args, vec![StackValue::Int(1_000)]);
}

#[tokio::test(start_paused = true)]
async fn malformed_state_is_rejected() {
    let ledger = MockLedger::new();
    ledger.set_stack(addr(9), readers::GET_VAULT_DATA, vec![StackValue::Int(1)]);
    let vault = VaultContract::from_address(addr(9));

    let err = vault.get_vault_data(&ledger).await.expect_err("short stack");
    assert!(matches!(
        err,
        ClientError::Protocol(ProtocolError::StackArity { .. })
    ));
}

fn strategy_config() -> StrategyConfig {
    StrategyConfig {
        vault_address: addr(9),
        pool_address: addr(0x60),
        pool_type: PoolType::Volatile,
        deposit_lp_wallet_address: None,
        jetton_wallet_address: None,
        admin_address: addr(2),
        jetton_vault_address: addr(0x61),
        native_vault_address: addr(0x62),
        upgrade: UpgradeSlot::default(),
    }
}

#[tokio::test(start_paused = true)]
async fn strategy_deploy_and_wallet_setup() {
    let ledger = MockLedger::new();
    let session = admin();
    let tracker = tracker();
    let via = Submitter::new(&ledger, &session, &tracker);

    let strategy = StrategyContract::from_init(code(0x2222), strategy_config(), 0).expect("init");
    strategy.send_deploy(&via, None, None).await.expect("deploy");
    strategy
        .send_set_jetton_wallet_address(
            &via,
            strategy::SetAddressOptions {
                address: addr(0x63),
                query_id: None,
                value: None,
            },
        )
        .await
        .expect("set jetton wallet");

    let subs = ledger.submissions();
    assert_eq!(subs.len(), 2);
    assert!(subs[0].message.state_init.is_some());
    assert!(subs.iter().all(|s| s.message.to == *strategy.address()));
    let mut s = subs[1].message.body.parse();
    assert_eq!(s.load_uint(32).expect("op") as u32, Opcode::SetJettonWalletAddress.code());
    s.load_uint(64).expect("qid");
    assert_eq!(s.load_address().expect("wallet"), addr(0x63));

    // Once set on chain, the reader reports it.
    let mut deployed = strategy_config();
    deployed.jetton_wallet_address = Some(addr(0x63));
    ledger.set_strategy(*strategy.address(), &deployed);
    let state = strategy.get_strategy_data(&ledger).await.expect("state");
    assert_eq!(state.jetton_wallet_address, Some(addr(0x63)));
    assert_eq!(state.pool_type, PoolType::Volatile);
}
