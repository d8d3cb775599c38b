//! Scrape-time collector over one or more accounting databases.

use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};

use crate::database::Database;

/// Exposes `traffic_bps` and `traffic_pps` for every record above
/// threshold, labeled with `{traffic_type, address, forwarding_status}`
/// and split into forwarded and dropped samples.
pub struct TrafficCollector {
    databases: Vec<Arc<Database>>,
    bps: GaugeVec,
    pps: GaugeVec,
}

const LABELS: &[&str] = &["traffic_type", "address", "forwarding_status"];

impl TrafficCollector {
    pub fn new(databases: Vec<Arc<Database>>) -> Self {
        let bps = GaugeVec::new(
            Opts::new(
                "traffic_bps",
                "Traffic volume in bits per second, for a given address",
            ),
            LABELS,
        )
        .expect("static descriptor is valid");
        let pps = GaugeVec::new(
            Opts::new(
                "traffic_pps",
                "Traffic in packets per second, for a given address",
            ),
            LABELS,
        )
        .expect("static descriptor is valid");
        Self {
            databases,
            bps,
            pps,
        }
    }
}

impl Collector for TrafficCollector {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.bps.desc();
        descs.extend(self.pps.desc());
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.bps.reset();
        self.pps.reset();

        for database in &self.databases {
            let params = database.params();
            for record in database.records() {
                if !record.above_threshold() {
                    continue;
                }
                let rates = record.rates(params.report_buckets, params.bucket_duration);
                let traffic_type = params.traffic_type.as_str();
                let address = record.address();
                self.bps
                    .with_label_values(&[traffic_type, address, "forwarded"])
                    .set(rates.fwd_bps);
                self.bps
                    .with_label_values(&[traffic_type, address, "dropped"])
                    .set(rates.drop_bps);
                self.pps
                    .with_label_values(&[traffic_type, address, "forwarded"])
                    .set(rates.fwd_pps);
                self.pps
                    .with_label_values(&[traffic_type, address, "dropped"])
                    .set(rates.drop_pps);
            }
        }

        let mut families = self.bps.collect();
        families.extend(self.pps.collect());
        families
    }
}
