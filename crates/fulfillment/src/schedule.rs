//! Delivery scheduling: carrier, transit time, ship and delivery dates.

use std::sync::Arc;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use promise_core::calendar::{add_days, is_business_day, next_business_day};
use promise_core::{
    DomainError, DomainResult, ItemCode, LineId, LineKey, OrderId, PipelineConfig, Priority,
};
use promise_sales::OrderLine;

use crate::availability::AtpResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub order_id: OrderId,
    pub line_id: LineId,
    pub item: ItemCode,
    /// Quantity the first shipment carries (the ATP available quantity).
    pub quantity: i64,
    pub carrier: String,
    pub transit_days: u32,
    pub ship_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub meets_customer_window: bool,
    pub notes: Vec<String>,
}

impl ScheduleResult {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.order_id.clone(), self.line_id.clone())
    }
}

/// Per-line random source.
///
/// Each line gets its own generator seeded from the batch seed and a stable
/// hash of its key, so a line's carrier and transit draw do not depend on
/// which worker ran it or in which order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRng {
    seed: u64,
}

impl LineRng {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn for_line(&self, key: &LineKey) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ stable_hash(key))
    }
}

// FNV-1a: stable across runs and platforms, unlike the std hasher.
fn stable_hash(key: &LineKey) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let order = key.order_id.as_str().bytes();
    let line = key.line_id.as_str().bytes();
    order
        .chain(std::iter::once(0xff))
        .chain(line)
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

#[derive(Debug, Clone)]
pub struct DeliveryScheduler {
    config: Arc<PipelineConfig>,
}

impl DeliveryScheduler {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }

    /// Schedule a line with the generator derived from its key.
    pub fn schedule_line(
        &self,
        atp: &AtpResult,
        line: &OrderLine,
        rng: &LineRng,
    ) -> DomainResult<ScheduleResult> {
        self.schedule(atp, line, &mut rng.for_line(&line.key()))
    }

    pub fn schedule<R: Rng>(
        &self,
        atp: &AtpResult,
        line: &OrderLine,
        rng: &mut R,
    ) -> DomainResult<ScheduleResult> {
        let preferred = self.config.carriers_for(line.priority);
        let name = match line.priority {
            Priority::Urgent => preferred.first(),
            Priority::Normal | Priority::Low => preferred.choose(rng),
        }
        .ok_or_else(|| {
            DomainError::config(format!(
                "no carrier preferred for priority {}",
                line.priority.as_str()
            ))
        })?;
        let carrier = self
            .config
            .carrier(name)
            .ok_or_else(|| DomainError::config(format!("unknown carrier {name}")))?;

        let transit_days = rng.random_range(carrier.min_transit_days..=carrier.max_transit_days);
        let ship_date = atp.earliest_available_date;
        let mut delivery_date = add_days(ship_date, transit_days);
        let mut notes = Vec::new();

        if let Some(window) = line.delivery_window {
            if !is_business_day(delivery_date) {
                delivery_date = next_business_day(delivery_date);
                notes.push(format!("Adjusted delivery to weekday: {delivery_date}"));
            }
            notes.push(format!(
                "Delivery window {}-{} recorded; time of day not checked",
                window.start.format("%H:%M"),
                window.end.format("%H:%M")
            ));
        }

        let blackout = &self.config.carrier_blackout_dates;
        while blackout.contains(&delivery_date) && delivery_date < NaiveDate::MAX {
            let mut next = add_days(delivery_date, 1);
            if line.delivery_window.is_some() {
                next = next_business_day(next);
            }
            notes.push(format!("{delivery_date} is a carrier blackout date, moved to {next}"));
            delivery_date = next;
        }

        notes.push(format!("Scheduled via {}, transit {} days", carrier.name, transit_days));

        Ok(ScheduleResult {
            order_id: atp.order_id.clone(),
            line_id: atp.line_id.clone(),
            item: atp.item.clone(),
            quantity: atp.available_quantity,
            carrier: carrier.name.clone(),
            transit_days,
            ship_date,
            delivery_date,
            meets_customer_window: true,
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::{AvailabilityEngine, SupplySnapshot};
    use chrono::NaiveTime;
    use promise_core::CarrierConfig;
    use promise_sales::DeliveryWindow;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, n).unwrap()
    }

    fn atp_for(config: &Arc<PipelineConfig>, line: &OrderLine) -> AtpResult {
        // Future production from 2026-10-19 with lead 14 + buffers 4 lands on Fri 2026-11-06.
        let snapshot = SupplySnapshot::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        AvailabilityEngine::new(config.clone()).compute(line, &snapshot)
    }

    fn one_day_fedex() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.carriers = vec![CarrierConfig::new("FedEx", 1, 1)];
        config
    }

    fn urgent_line() -> OrderLine {
        OrderLine::new("SO-1", "001", "WIDGET-A", 5, day(3)).with_priority(Priority::Urgent)
    }

    fn window() -> DeliveryWindow {
        DeliveryWindow::new(
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        )
    }

    #[test]
    fn urgent_lines_always_take_the_first_carrier() {
        let config = Arc::new(PipelineConfig::default());
        let scheduler = DeliveryScheduler::new(config.clone());
        let line = urgent_line();
        let atp = atp_for(&config, &line);

        for seed in 0..20 {
            let s = scheduler.schedule_line(&atp, &line, &LineRng::new(seed)).unwrap();
            assert_eq!(s.carrier, "FedEx");
            assert!((1..=3).contains(&s.transit_days));
            assert_eq!(s.ship_date, atp.earliest_available_date);
        }
    }

    #[test]
    fn same_seed_gives_same_schedule() {
        let config = Arc::new(PipelineConfig::default());
        let scheduler = DeliveryScheduler::new(config.clone());
        let line = OrderLine::new("SO-1", "002", "WIDGET-A", 5, day(3)).with_priority(Priority::Low);
        let atp = atp_for(&config, &line);

        let a = scheduler.schedule_line(&atp, &line, &LineRng::new(42)).unwrap();
        let b = scheduler.schedule_line(&atp, &line, &LineRng::new(42)).unwrap();
        assert_eq!(a, b);
        assert!(["USPS", "DHL"].contains(&a.carrier.as_str()));
        let carrier = config.carrier(&a.carrier).unwrap();
        assert!(a.transit_days >= carrier.min_transit_days && a.transit_days <= carrier.max_transit_days);
    }

    #[test]
    fn line_generators_depend_only_on_the_key() {
        let rng = LineRng::new(7);
        let k1 = LineKey::new(OrderId::new("SO-1"), LineId::new("001"));
        let k2 = LineKey::new(OrderId::new("SO-1"), LineId::new("002"));
        assert_eq!(stable_hash(&k1), stable_hash(&k1.clone()));
        assert_ne!(stable_hash(&k1), stable_hash(&k2));

        let mut a = rng.for_line(&k1);
        let mut b = rng.for_line(&k1);
        assert_eq!(a.random_range(0..1_000_000u32), b.random_range(0..1_000_000u32));
    }

    #[test]
    fn weekend_delivery_moves_to_monday_with_a_window() {
        let config = Arc::new(one_day_fedex());
        let scheduler = DeliveryScheduler::new(config.clone());
        let line = urgent_line().with_window(window());
        let atp = atp_for(&config, &line);
        assert_eq!(atp.earliest_available_date, day(6));

        let s = scheduler.schedule_line(&atp, &line, &LineRng::new(1)).unwrap();
        assert_eq!(s.delivery_date, day(9));
        assert!(s.meets_customer_window);
        assert!(s.notes.iter().any(|n| n.contains("time of day not checked")));
    }

    #[test]
    fn weekend_delivery_stands_without_a_window() {
        let config = Arc::new(one_day_fedex());
        let scheduler = DeliveryScheduler::new(config.clone());
        let line = urgent_line();
        let atp = atp_for(&config, &line);

        let s = scheduler.schedule_line(&atp, &line, &LineRng::new(1)).unwrap();
        assert_eq!(s.delivery_date, day(7));
    }

    #[test]
    fn blackout_dates_push_delivery_forward() {
        let mut config = one_day_fedex();
        config.carrier_blackout_dates = vec![day(7), day(8)];
        let config = Arc::new(config);
        let scheduler = DeliveryScheduler::new(config.clone());
        let line = urgent_line();
        let atp = atp_for(&config, &line);

        let s = scheduler.schedule_line(&atp, &line, &LineRng::new(1)).unwrap();
        assert_eq!(s.delivery_date, day(9));
    }

    #[test]
    fn unknown_preferred_carrier_is_a_config_error() {
        let mut config = PipelineConfig::default();
        config.carriers = vec![CarrierConfig::new("Acme", 1, 2)];
        let config = Arc::new(config);
        let scheduler = DeliveryScheduler::new(config.clone());
        let line = urgent_line();
        let atp = atp_for(&config, &line);

        let err = scheduler.schedule_line(&atp, &line, &LineRng::new(1)).unwrap_err();
        assert!(matches!(err, DomainError::Config(_)));
    }
}
