// 9.2 custody.rs: the boundary between external wallets and the ledger.
// the engine only talks to `TokenBridge`. `InMemoryBridge` is MOCKED:
// wallets and the exchange's custody are just maps, no real token transfers.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::types::{AccountId, Amount, AssetId, NativeAmount, AMOUNT_SCALE};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustodyError {
    #[error("unknown asset {0}")]
    UnknownAsset(AssetId),

    #[error("wallet of {account} holds {available} of {asset}, needs {requested}")]
    InsufficientWallet {
        account: AccountId,
        asset: AssetId,
        requested: NativeAmount,
        available: NativeAmount,
    },

    #[error("custody holds {available} of {asset}, needs {requested}")]
    InsufficientCustody {
        asset: AssetId,
        requested: NativeAmount,
        available: NativeAmount,
    },

    #[error("amount {0} does not fit the unit conversion")]
    ConversionOverflow(String),
}

/// Token transfer and decimals collaborator.
///
/// `transfer_in` pulls from the account's external wallet into exchange
/// custody, `transfer_out` pushes the other way. `wrap`/`unwrap` convert the
/// native coin held in custody to and from `wrapped_native()`. `pay` and
/// `receive` settle a swap with an external counterparty such as the pool.
pub trait TokenBridge {
    fn decimals_of(&self, asset: AssetId) -> Result<u8, CustodyError>;

    fn transfer_in(&mut self, asset: AssetId, account: AccountId, amount: NativeAmount) -> Result<(), CustodyError>;

    fn transfer_out(&mut self, asset: AssetId, account: AccountId, amount: NativeAmount) -> Result<(), CustodyError>;

    fn wrapped_native(&self) -> AssetId;

    fn pay(&mut self, asset: AssetId, amount: NativeAmount) -> Result<(), CustodyError>;

    fn receive(&mut self, asset: AssetId, amount: NativeAmount) -> Result<(), CustodyError>;

    fn wrap(&mut self, amount: NativeAmount) -> Result<(), CustodyError>;

    fn unwrap(&mut self, amount: NativeAmount) -> Result<(), CustodyError>;

    /// Native integer units to 8-digit ledger units, flooring extra precision.
    fn to_ledger_units(&self, asset: AssetId, amount: NativeAmount) -> Result<Amount, CustodyError> {
        let decimals = self.decimals_of(asset)?;
        let raw = i128::try_from(amount.0)
            .map_err(|_| CustodyError::ConversionOverflow(amount.to_string()))?;
        let value = Decimal::try_from_i128_with_scale(raw, u32::from(decimals))
            .map_err(|_| CustodyError::ConversionOverflow(amount.to_string()))?;
        Ok(Amount::new(value))
    }

    /// 8-digit ledger units to native integer units. negatives are rejected.
    fn to_native_units(&self, asset: AssetId, amount: Amount) -> Result<NativeAmount, CustodyError> {
        let decimals = self.decimals_of(asset)?;
        if amount.is_negative() {
            return Err(CustodyError::ConversionOverflow(amount.to_string()));
        }
        let decimals = u32::from(decimals);
        let scaled = if decimals >= AMOUNT_SCALE {
            let factor = 10u128.checked_pow(decimals - AMOUNT_SCALE);
            let units = amount
                .value()
                .checked_mul(Decimal::from(10u64.pow(AMOUNT_SCALE)))
                .and_then(|v| v.to_u128());
            units.zip(factor).and_then(|(u, f)| u.checked_mul(f))
        } else {
            let factor = Decimal::from(10u64.pow(decimals));
            amount
                .value()
                .checked_mul(factor)
                .and_then(|v| v.trunc().to_u128())
        };
        scaled
            .map(NativeAmount)
            .ok_or_else(|| CustodyError::ConversionOverflow(amount.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryBridge {
    decimals: HashMap<AssetId, u8>,
    wallets: HashMap<(AccountId, AssetId), NativeAmount>,
    custody: HashMap<AssetId, NativeAmount>,
    wrapped_native: AssetId,
}

impl InMemoryBridge {
    /// Registers the native coin with 18 decimals and its wrapped twin.
    pub fn new(wrapped_native: AssetId) -> Self {
        let mut decimals = HashMap::new();
        decimals.insert(AssetId::NATIVE, 18);
        decimals.insert(wrapped_native, 18);
        Self {
            decimals,
            wallets: HashMap::new(),
            custody: HashMap::new(),
            wrapped_native,
        }
    }

    pub fn register_asset(&mut self, asset: AssetId, decimals: u8) {
        self.decimals.insert(asset, decimals);
    }

    /// Mints into a wallet.
    pub fn fund_wallet(&mut self, account: AccountId, asset: AssetId, amount: NativeAmount) {
        let entry = self.wallets.entry((account, asset)).or_default();
        entry.0 += amount.0;
    }

    /// Mints into custody, standing in for reserves the exchange already holds.
    pub fn fund_custody(&mut self, asset: AssetId, amount: NativeAmount) {
        let entry = self.custody.entry(asset).or_default();
        entry.0 += amount.0;
    }

    pub fn wallet_balance(&self, account: AccountId, asset: AssetId) -> NativeAmount {
        self.wallets.get(&(account, asset)).copied().unwrap_or_default()
    }

    pub fn custody_balance(&self, asset: AssetId) -> NativeAmount {
        self.custody.get(&asset).copied().unwrap_or_default()
    }

    fn take_custody(&mut self, asset: AssetId, amount: NativeAmount) -> Result<(), CustodyError> {
        let available = self.custody_balance(asset);
        if available.0 < amount.0 {
            return Err(CustodyError::InsufficientCustody {
                asset,
                requested: amount,
                available,
            });
        }
        self.custody.insert(asset, NativeAmount(available.0 - amount.0));
        Ok(())
    }
}

impl TokenBridge for InMemoryBridge {
    fn decimals_of(&self, asset: AssetId) -> Result<u8, CustodyError> {
        self.decimals
            .get(&asset)
            .copied()
            .ok_or(CustodyError::UnknownAsset(asset))
    }

    fn transfer_in(&mut self, asset: AssetId, account: AccountId, amount: NativeAmount) -> Result<(), CustodyError> {
        self.decimals_of(asset)?;
        let available = self.wallet_balance(account, asset);
        if available.0 < amount.0 {
            return Err(CustodyError::InsufficientWallet {
                account,
                asset,
                requested: amount,
                available,
            });
        }
        self.wallets.insert((account, asset), NativeAmount(available.0 - amount.0));
        self.fund_custody(asset, amount);
        Ok(())
    }

    fn transfer_out(&mut self, asset: AssetId, account: AccountId, amount: NativeAmount) -> Result<(), CustodyError> {
        self.decimals_of(asset)?;
        self.take_custody(asset, amount)?;
        self.fund_wallet(account, asset, amount);
        Ok(())
    }

    fn wrapped_native(&self) -> AssetId {
        self.wrapped_native
    }

    fn pay(&mut self, asset: AssetId, amount: NativeAmount) -> Result<(), CustodyError> {
        self.decimals_of(asset)?;
        self.take_custody(asset, amount)
    }

    fn receive(&mut self, asset: AssetId, amount: NativeAmount) -> Result<(), CustodyError> {
        self.decimals_of(asset)?;
        self.fund_custody(asset, amount);
        Ok(())
    }

    fn wrap(&mut self, amount: NativeAmount) -> Result<(), CustodyError> {
        self.take_custody(AssetId::NATIVE, amount)?;
        self.fund_custody(self.wrapped_native, amount);
        Ok(())
    }

    fn unwrap(&mut self, amount: NativeAmount) -> Result<(), CustodyError> {
        self.take_custody(self.wrapped_native, amount)?;
        self.fund_custody(AssetId::NATIVE, amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const USDT: AssetId = AssetId(2);
    const WETH: AssetId = AssetId(9);
    const ALICE: AccountId = AccountId(1);

    fn bridge() -> InMemoryBridge {
        let mut bridge = InMemoryBridge::new(WETH);
        bridge.register_asset(USDT, 6);
        bridge
    }

    #[test]
    fn unit_conversion_both_ways() {
        let bridge = bridge();
        // 1.5 USDT with 6 decimals
        let ledger = bridge.to_ledger_units(USDT, NativeAmount(1_500_000)).unwrap();
        assert_eq!(ledger.value(), dec!(1.5));
        assert_eq!(bridge.to_native_units(USDT, ledger).unwrap(), NativeAmount(1_500_000));

        // 18 decimals floors below 1e-8
        let eth = bridge
            .to_ledger_units(AssetId::NATIVE, NativeAmount(1_000_000_000_000_000_001))
            .unwrap();
        assert_eq!(eth.value(), dec!(1));
        assert_eq!(
            bridge.to_native_units(AssetId::NATIVE, eth).unwrap(),
            NativeAmount(1_000_000_000_000_000_000)
        );
    }

    #[test]
    fn unknown_asset_is_rejected() {
        let bridge = bridge();
        assert_eq!(
            bridge.to_ledger_units(AssetId(77), NativeAmount(1)),
            Err(CustodyError::UnknownAsset(AssetId(77)))
        );
    }

    #[test]
    fn transfers_move_between_wallet_and_custody() {
        let mut bridge = bridge();
        bridge.fund_wallet(ALICE, USDT, NativeAmount(100));

        bridge.transfer_in(USDT, ALICE, NativeAmount(60)).unwrap();
        assert_eq!(bridge.wallet_balance(ALICE, USDT), NativeAmount(40));
        assert_eq!(bridge.custody_balance(USDT), NativeAmount(60));

        let err = bridge.transfer_in(USDT, ALICE, NativeAmount(41));
        assert!(matches!(err, Err(CustodyError::InsufficientWallet { .. })));

        bridge.transfer_out(USDT, ALICE, NativeAmount(10)).unwrap();
        assert_eq!(bridge.wallet_balance(ALICE, USDT), NativeAmount(50));
        assert_eq!(bridge.custody_balance(USDT), NativeAmount(50));
    }

    #[test]
    fn counterparty_settlement_moves_custody_only() {
        let mut bridge = bridge();
        bridge.fund_wallet(ALICE, USDT, NativeAmount(100));
        bridge.transfer_in(USDT, ALICE, NativeAmount(100)).unwrap();

        bridge.pay(USDT, NativeAmount(70)).unwrap();
        assert_eq!(bridge.custody_balance(USDT), NativeAmount(30));
        assert!(matches!(
            bridge.pay(USDT, NativeAmount(31)),
            Err(CustodyError::InsufficientCustody { .. })
        ));

        bridge.receive(WETH, NativeAmount(5)).unwrap();
        assert_eq!(bridge.custody_balance(WETH), NativeAmount(5));
        assert_eq!(bridge.wallet_balance(ALICE, USDT), NativeAmount(0));
        assert_eq!(bridge.receive(AssetId(77), NativeAmount(1)), Err(CustodyError::UnknownAsset(AssetId(77))));
    }

    #[test]
    fn wrap_and_unwrap_native() {
        let mut bridge = bridge();
        bridge.fund_custody(AssetId::NATIVE, NativeAmount(5));
        bridge.wrap(NativeAmount(3)).unwrap();
        assert_eq!(bridge.custody_balance(WETH), NativeAmount(3));
        bridge.unwrap(NativeAmount(1)).unwrap();
        assert_eq!(bridge.custody_balance(AssetId::NATIVE), NativeAmount(3));
        assert!(bridge.unwrap(NativeAmount(10)).is_err());
    }
}
