// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: load and inspect existing PDF documents and merge several of
// them into one, using the `lopdf` crate.

use carestudio_core::error::{CareStudioError, Result};
use carestudio_core::types::SourceFile;
use lopdf::{Document, Object, ObjectId, dictionary};
use tracing::{debug, info, instrument};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guard against cyclic /Parent chains in damaged files.
const MAX_TREE_DEPTH: usize = 64;

/// An existing PDF loaded into memory, used to validate and inspect inputs
/// and outputs.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    /// Load a PDF from raw bytes.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            CareStudioError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

// -- Merge --------------------------------------------------------------------

/// Concatenate the pages of every source PDF, in the order given, into one
/// new document.
///
/// Each source's objects are renumbered into a fresh id range and copied
/// across; its catalog and page-tree nodes are dropped and replaced by a
/// single flat page tree. Attributes the pages inherited from the old tree
/// are copied onto the pages first. Any unreadable input fails the whole
/// merge.
#[instrument(skip_all, fields(documents = sources.len()))]
pub fn merge_documents(sources: &[SourceFile]) -> Result<Vec<u8>> {
    if sources.len() < 2 {
        return Err(CareStudioError::InvalidInput(
            "please select two or more PDF files.".into(),
        ));
    }

    let mut merged = Document::with_version("1.5");
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut next_id: u32 = 1;

    for source in sources {
        let mut document = Document::load_mem(&source.bytes).map_err(|err| {
            CareStudioError::PdfError(format!("failed to read {}: {}", source.name, err))
        })?;

        document.renumber_objects_with(next_id);
        next_id = document.max_id + 1;

        let pages = document.get_pages();
        debug!(file = %source.name, pages = pages.len(), "Collecting pages");

        // BTreeMap keyed by page number, so iteration is in document order.
        for page_id in pages.values() {
            materialize_inherited(&mut document, *page_id)?;
            page_ids.push(*page_id);
        }

        for (id, object) in document.objects {
            if is_page_tree_node(&object) {
                continue;
            }
            merged.objects.insert(id, object);
        }
    }

    let pages_id: ObjectId = (next_id, 0);
    merged.max_id = next_id;

    for page_id in &page_ids {
        let page = merged
            .get_object_mut(*page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| CareStudioError::PdfError(format!("page object missing: {}", err)))?;
        page.set("Parent", pages_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );

    let catalog_id = merged.new_object_id();
    merged.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );
    merged.trailer.set("Root", catalog_id);

    let pruned = merged.prune_objects();
    debug!(pruned = pruned.len(), "Unreferenced objects removed");

    let mut output = Vec::new();
    merged.save_to(&mut output).map_err(|err| {
        CareStudioError::PdfError(format!("failed to serialise merged PDF: {}", err))
    })?;

    info!(
        pages = page_ids.len(),
        output_bytes = output.len(),
        "Merge complete"
    );
    Ok(output)
}

/// Catalogs and intermediate /Pages nodes are rebuilt for the merged file.
fn is_page_tree_node(object: &Object) -> bool {
    match object {
        Object::Dictionary(dict) => matches!(
            dict.get(b"Type").and_then(Object::as_name),
            Ok(b"Catalog") | Ok(b"Pages")
        ),
        _ => false,
    }
}

/// Copy attributes the page inherits from its /Parent chain onto the page
/// itself, so it survives being re-parented.
fn materialize_inherited(document: &mut Document, page_id: ObjectId) -> Result<()> {
    let mut inherited: Vec<(&[u8], Object)> = Vec::new();
    {
        let page = document.get_dictionary(page_id).map_err(|err| {
            CareStudioError::PdfError(format!("page {:?} unreadable: {}", page_id, err))
        })?;

        let mut missing: Vec<&[u8]> = INHERITABLE_KEYS
            .iter()
            .copied()
            .filter(|key| !page.has(key))
            .collect();
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;

        while let Some(parent_id) = parent {
            if missing.is_empty() || depth >= MAX_TREE_DEPTH {
                break;
            }
            let Ok(node) = document.get_dictionary(parent_id) else {
                break;
            };
            missing.retain(|key| match node.get(key) {
                Ok(value) => {
                    inherited.push((*key, value.clone()));
                    false
                }
                Err(_) => true,
            });
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
            depth += 1;
        }
    }

    if inherited.is_empty() {
        return Ok(());
    }

    let page = document
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| CareStudioError::PdfError(format!("page {:?} unreadable: {}", page_id, err)))?;
    for (key, value) in inherited {
        page.set(key, value);
    }
    Ok(())
}
