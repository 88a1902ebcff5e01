// Report -> NormalizedRecord reduction

use crate::record::NormalizedRecord;
use crxaudit_client::RawReport;
use crxaudit_client::report::{ReportDocument, Risk, SubScore, WebstoreListing};
use serde_json::Number;

/// Reduce a report to a flat record. Pure: never touches the network.
pub fn normalize(extension_id: &str, report: &RawReport) -> NormalizedRecord {
    match report {
        RawReport::NotScanned => NormalizedRecord::no_data(extension_id),
        RawReport::Scanned(doc) => from_document(extension_id, doc),
    }
}

fn from_document(extension_id: &str, doc: &ReportDocument) -> NormalizedRecord {
    let data = &doc.data;
    let risk = data.risk.as_ref();

    let record = NormalizedRecord {
        total_risk: risk.and_then(|r| r.total.clone()),
        csp_risk: sub_score(risk, |r| r.csp.as_ref()),
        permissions_risk: sub_score(risk, |r| r.permissions.as_ref()),
        webstore_risk: sub_score(risk, |r| r.webstore.as_ref()),
        urls: data.extcalls.clone(),
        dangerous_fns: data
            .dangerousfunctions
            .as_ref()
            .map(|fns| fns.keys().cloned().collect()),
        entrypoints: data.entrypoints.clone(),
        manifest: data.manifest.clone(),
        ..NormalizedRecord::unknown(extension_id)
    };

    match &data.webstore {
        // `{}` carries nothing, same as a missing listing
        Some(listing) if *listing != WebstoreListing::default() => {
            with_listing(record, listing, doc.version.as_deref())
        }
        // listing comes as one unit: without it every listing field stays unknown
        _ => record,
    }
}

fn sub_score(risk: Option<&Risk>, pick: impl Fn(&Risk) -> Option<&SubScore>) -> Option<Number> {
    risk.and_then(pick).and_then(|score| score.total.clone())
}

fn with_listing(
    record: NormalizedRecord,
    listing: &WebstoreListing,
    report_version: Option<&str>,
) -> NormalizedRecord {
    NormalizedRecord {
        name: listing.name.clone(),
        short_description: listing.short_description.clone(),
        // the store's version wins over the report's own
        version: listing
            .version
            .clone()
            .or_else(|| report_version.map(str::to_string)),
        last_updated: listing.last_updated.clone(),
        offered_by: listing.offered_by.clone(),
        rating: listing.rating,
        rating_users: listing.rating_users,
        users: listing.users,
        size: listing.size.clone(),
        kind: listing.kind.clone(),
        permission_warnings: listing.permission_warnings.clone(),
        email: listing.email.clone(),
        address: listing.address.clone(),
        privacy_policy: listing.privacy_policy.clone(),
        ..record
    }
}
