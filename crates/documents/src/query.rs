//! Read-only document queries.

use tally_core::StoreResult;
use tally_parties::PartnerRows;

use crate::document::{BusinessDocument, DocumentKind, DocumentRows, DocumentStatus};

/// Documents in `status`, optionally of one kind, newest date first.
pub fn list_by_status<R>(
    rows: &mut R,
    kind: Option<DocumentKind>,
    status: DocumentStatus,
) -> StoreResult<Vec<BusinessDocument>>
where
    R: DocumentRows + ?Sized,
{
    let mut docs: Vec<BusinessDocument> = rows
        .documents()?
        .into_iter()
        .filter(|d| d.status == status && kind.is_none_or(|k| d.kind == k))
        .collect();
    sort(&mut docs);
    Ok(docs)
}

/// Case-insensitive match on document number, memo or partner name.
///
/// Blank text matches everything.
pub fn search<R>(rows: &mut R, text: &str) -> StoreResult<Vec<BusinessDocument>>
where
    R: DocumentRows + PartnerRows + ?Sized,
{
    let needle = text.trim().to_lowercase();
    let mut found = Vec::new();
    for doc in rows.documents()? {
        let hit = needle.is_empty()
            || doc.number.to_lowercase().contains(&needle)
            || doc.memo.to_lowercase().contains(&needle)
            || rows
                .partner(doc.partner_id)?
                .is_some_and(|p| p.name.to_lowercase().contains(&needle));
        if hit {
            found.push(doc);
        }
    }
    sort(&mut found);
    Ok(found)
}

fn sort(docs: &mut [BusinessDocument]) {
    docs.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.number.cmp(&b.number)));
}
