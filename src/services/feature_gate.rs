//! Pure capability predicates over a resolved plan. No I/O, no side
//! effects; every product rule about what a tier may do lives in this
//! lookup table and nowhere else.

use crate::models::common::{Plan, ResolvedPlan};

/// Invoices a plan may hold in total. None means unlimited.
pub fn invoice_limit(plan: Plan) -> Option<u32> {
    match plan {
        Plan::Free => Some(3),
        Plan::Pro | Plan::Business => None,
    }
}

/// Whether another invoice may be created given how many already exist.
pub fn can_create_invoice(plan: Plan, existing_count: u32) -> bool {
    match invoice_limit(plan) {
        Some(limit) => existing_count < limit,
        None => true,
    }
}

/// Custom tax rates on invoice line items. Paid tiers only.
pub fn tax_rates_enabled(plan: Plan) -> bool {
    plan.is_paid()
}

/// Per-region tax configuration (multiple jurisdictions). Business only.
pub fn tax_regions_enabled(plan: Plan) -> bool {
    plan >= Plan::Business
}

/// Custom logo and branding on rendered invoices. Business only.
pub fn custom_branding_enabled(plan: Plan) -> bool {
    plan >= Plan::Business
}

/// Voice-note invoice extraction. Paid tiers only.
pub fn voice_extraction_enabled(plan: Plan) -> bool {
    plan.is_paid()
}

/// Gate decisions for a resolved plan. Expired/none resolutions already
/// carry plan=free, so these delegate straight to the plan table.
impl ResolvedPlan {
    pub fn can_create_invoice(&self, existing_count: u32) -> bool {
        can_create_invoice(self.plan, existing_count)
    }

    pub fn tax_rates_enabled(&self) -> bool {
        tax_rates_enabled(self.plan)
    }
}
