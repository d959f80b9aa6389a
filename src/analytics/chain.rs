//! Option chain assembly
//!
//! Joins the contract catalogue with the latest price snapshot into a
//! side-split, strike-sorted chain for one underlying/expiry.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::core::{
    ChainItem, OptionChainResponse, OptionContract, OptionRight, OptionsError, OptionsResult,
    PriceRecord,
};
use crate::data::{ContractRepository, PriceStore};

/// Builds [`OptionChainResponse`]s from a contract repository and a price store
pub struct OptionChainAssembler<R, P> {
    contracts: R,
    prices: P,
}

impl<R: ContractRepository, P: PriceStore> OptionChainAssembler<R, P> {
    pub fn new(contracts: R, prices: P) -> Self {
        Self { contracts, prices }
    }

    /// Assemble the chain for one underlying/expiry
    ///
    /// Fails with `NotFound` when no active contract is listed. Contract
    /// prices come from a single batched lookup; when it fails, or the spot
    /// lookup fails, the chain is still built with those values absent.
    pub fn build_chain(
        &self,
        underlying: &str,
        expiry: NaiveDate,
    ) -> OptionsResult<OptionChainResponse> {
        let contracts = self.contracts.active_contracts(underlying, expiry)?;
        if contracts.is_empty() {
            return Err(OptionsError::not_found(format!(
                "no active contracts for {} expiring {}",
                underlying, expiry
            )));
        }

        let codes: Vec<String> = contracts.iter().map(|c| c.code.clone()).collect();
        let mut prices = match self.prices.latest_prices(&codes) {
            Ok(prices) => prices,
            Err(e) => {
                tracing::warn!("Price lookup for {} failed, chain left unpriced: {}", underlying, e);
                HashMap::new()
            }
        };

        let spot = match self.prices.latest_price(underlying) {
            Ok(record) => record.map(|r| r.close).filter(|s| s.is_finite() && *s > 0.0),
            Err(e) => {
                tracing::warn!("Spot lookup for {} failed: {}", underlying, e);
                None
            }
        };

        let mut chain = OptionChainResponse {
            underlying: underlying.to_string(),
            expiry,
            spot,
            calls: Vec::new(),
            puts: Vec::new(),
        };

        let mut priced = 0;
        for contract in contracts {
            let record = prices.remove(&contract.code);
            priced += usize::from(record.is_some());
            let item = chain_item(&contract, record);
            match contract.right {
                OptionRight::Call => chain.calls.push(item),
                OptionRight::Put => chain.puts.push(item),
            }
        }
        chain.sort_by_strike();

        tracing::debug!(
            "Built {} chain for {}: {} calls, {} puts, {} priced",
            underlying,
            expiry,
            chain.calls.len(),
            chain.puts.len(),
            priced
        );
        Ok(chain)
    }
}

fn chain_item(contract: &OptionContract, record: Option<PriceRecord>) -> ChainItem {
    let mut item = ChainItem::new(contract.code.clone(), contract.strike);
    if let Some(record) = record {
        item.price = Some(record.close);
        item.bid = record.bid;
        item.ask = record.ask;
        item.volume = record.volume;
        item.open_interest = record.open_interest;
        item.price_ts = Some(record.timestamp);
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InMemoryContractRepository, InMemoryPriceStore};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Records every batch lookup it serves
    struct RecordingStore {
        inner: InMemoryPriceStore,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl PriceStore for RecordingStore {
        fn latest_prices(&self, symbols: &[String]) -> OptionsResult<HashMap<String, PriceRecord>> {
            self.calls.lock().unwrap().push(symbols.to_vec());
            self.inner.latest_prices(symbols)
        }
    }

    struct DownStore;

    impl PriceStore for DownStore {
        fn latest_prices(&self, _symbols: &[String]) -> OptionsResult<HashMap<String, PriceRecord>> {
            Err(OptionsError::network("price store down"))
        }
    }

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 19).unwrap()
    }

    fn repo() -> InMemoryContractRepository {
        let repo = InMemoryContractRepository::new();
        for (code, right, strike) in [
            ("TXO18200C5", OptionRight::Call, dec!(18200)),
            ("TXO17800C5", OptionRight::Call, dec!(17800)),
            ("TXO18000O5", OptionRight::Put, dec!(18000)),
            ("TXO18000C5", OptionRight::Call, dec!(18000)),
            ("TXO17600O5", OptionRight::Put, dec!(17600)),
        ] {
            repo.register(OptionContract::new(code, "TXO", right, strike, expiry(), dec!(50)))
                .unwrap();
        }
        repo
    }

    #[test]
    fn test_chain_sorted_and_split() {
        let prices = InMemoryPriceStore::new();
        let mut record = PriceRecord::new("TXO18000C5", Utc::now(), 210.0);
        record.bid = Some(209.0);
        record.ask = Some(211.0);
        prices.put(record).unwrap();
        prices.put(PriceRecord::new("TXO", Utc::now(), 18010.0)).unwrap();

        let chain = OptionChainAssembler::new(repo(), prices)
            .build_chain("TXO", expiry())
            .unwrap();

        assert_eq!(chain.calls.len(), 3);
        assert_eq!(chain.puts.len(), 2);
        assert_eq!(chain.spot, Some(18010.0));
        assert!(chain.calls.windows(2).all(|w| w[0].strike <= w[1].strike));
        assert!(chain.puts.windows(2).all(|w| w[0].strike <= w[1].strike));

        let atm = &chain.calls[1];
        assert_eq!(atm.contract_code, "TXO18000C5");
        assert_eq!(atm.price, Some(210.0));
        assert_eq!(atm.bid, Some(209.0));
        assert!(atm.greeks.is_none());
        assert!(chain.calls[0].price.is_none());
    }

    #[test]
    fn test_no_contracts_is_not_found() {
        let assembler =
            OptionChainAssembler::new(InMemoryContractRepository::new(), InMemoryPriceStore::new());
        let err = assembler.build_chain("TXO", expiry()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_single_batch_price_lookup() {
        let store = RecordingStore {
            inner: InMemoryPriceStore::new(),
            calls: Mutex::new(Vec::new()),
        };
        let assembler = OptionChainAssembler::new(repo(), store);

        let chain = assembler.build_chain("TXO", expiry()).unwrap();
        assert_eq!(chain.spot, None);

        let calls = assembler.prices.calls.lock().unwrap();
        let batches: Vec<&Vec<String>> = calls
            .iter()
            .filter(|symbols| symbols.iter().any(|s| s.starts_with("TXO1")))
            .collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 5);
    }

    #[test]
    fn test_price_store_outage_leaves_chain_unpriced() {
        let chain = OptionChainAssembler::new(repo(), DownStore)
            .build_chain("TXO", expiry())
            .unwrap();

        assert_eq!(chain.len(), 5);
        assert_eq!(chain.spot, None);
        assert!(chain.calls.iter().chain(&chain.puts).all(|i| i.price.is_none()));
    }
}
