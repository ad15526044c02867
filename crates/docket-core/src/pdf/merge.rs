//! Concatenation of PDF documents.

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info};

use super::Result;
use crate::error::{DocketError, InputError, PdfError};
use crate::models::document::{DocumentFile, DocumentType};
use crate::storage::write_atomic;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Merge PDFs given as bytes, pages in argument order.
///
/// Objects of every later document are renumbered past the highest id seen so
/// far and its pages are appended to the page tree of the first document.
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>> {
    let mut loaded = Vec::with_capacity(documents.len());
    for (i, bytes) in documents.iter().enumerate() {
        let doc = Document::load_mem(bytes)
            .map_err(|e| PdfError::Parse(format!("document {}: {}", i, e)))?;
        loaded.push(doc);
    }

    let mut sources = loaded.into_iter();
    let mut dest = sources
        .next()
        .ok_or_else(|| PdfError::Merge("no documents to merge".to_string()))?;

    let pages_id = pages_root(&dest)?;
    let mut page_refs: Vec<ObjectId> = dest.get_pages().values().copied().collect();
    let mut max_id = dest.max_id;

    // The root Kids are rewritten flat, so nested pages move up to the root too.
    for &page_id in &page_refs {
        if parent_of(&dest, page_id) != Some(pages_id) {
            adopt_page(&mut dest, page_id, pages_id)?;
        }
    }

    for source in sources {
        let offset = max_id;
        let source_pages: Vec<ObjectId> = source.get_pages().values().copied().collect();

        for (id, object) in source.objects {
            dest.objects.insert((id.0 + offset, id.1), remap_refs(object, offset));
        }

        for (id, generation) in source_pages {
            let page_id = (id + offset, generation);
            adopt_page(&mut dest, page_id, pages_id)?;
            page_refs.push(page_id);
        }

        max_id = max_id.max(source.max_id + offset);
    }

    dest.max_id = max_id;
    set_kids(&mut dest, pages_id, &page_refs)?;

    let pruned = dest.prune_objects();
    debug!("Merged {} pages, pruned {} orphaned objects", page_refs.len(), pruned.len());
    dest.compress();

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer)
        .map_err(|e| PdfError::Merge(format!("failed to save merged PDF: {}", e)))?;
    Ok(buffer)
}

/// Merge PDF files into `merged_<a>_<b>[...].pdf` next to the first input.
pub fn merge_files(files: &[DocumentFile]) -> std::result::Result<DocumentFile, DocketError> {
    let first = files
        .first()
        .ok_or_else(|| PdfError::Merge("no documents to merge".to_string()))?;

    if let Some(other) = files.iter().find(|f| f.doc_type() != DocumentType::Pdf) {
        return Err(InputError::WrongType {
            stage: "merge",
            doc_type: other.doc_type().to_string(),
        }
        .into());
    }

    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        documents.push(std::fs::read(file.path())?);
    }

    let merged = merge_documents(documents)?;

    let names: Vec<&str> = files.iter().map(|f| f.name()).collect();
    let name = format!("merged_{}", names.join("_"));
    let file_name = format!("{}.pdf", name);
    let path = first.directory().join(&file_name);
    write_atomic(&path, &merged)?;

    info!("Merged {} files into {}", files.len(), path.display());
    Ok(DocumentFile::new(&file_name, DocumentType::Pdf, path))
}

fn pages_root(doc: &Document) -> Result<ObjectId> {
    doc.catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| PdfError::Merge(format!("missing page tree: {}", e)))
}

/// Re-parent a page under `pages_id`, first copying down the
/// attributes it used to inherit from its original page tree.
fn adopt_page(doc: &mut Document, page_id: ObjectId, pages_id: ObjectId) -> Result<()> {
    let mut inherited = Dictionary::new();
    let mut parent = parent_of(doc, page_id);
    while let Some(node_id) = parent {
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        for key in INHERITABLE {
            if !inherited.has(key) {
                if let Ok(value) = node.get(key) {
                    inherited.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = parent_of(doc, node_id);
    }

    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|e| PdfError::Merge(format!("page {:?}: {}", page_id, e)))?;
    for (key, value) in inherited.iter() {
        if !page.has(key) {
            page.set(key.clone(), value.clone());
        }
    }
    page.set("Parent", Object::Reference(pages_id));
    Ok(())
}

fn parent_of(doc: &Document, node_id: ObjectId) -> Option<ObjectId> {
    doc.get_dictionary(node_id)
        .ok()?
        .get(b"Parent")
        .ok()?
        .as_reference()
        .ok()
}

fn set_kids(doc: &mut Document, pages_id: ObjectId, page_refs: &[ObjectId]) -> Result<()> {
    let pages = doc
        .get_dictionary_mut(pages_id)
        .map_err(|e| PdfError::Merge(format!("invalid page tree: {}", e)))?;
    let kids = page_refs.iter().map(|&id| Object::Reference(id)).collect();
    pages.set("Kids", Object::Array(kids));
    pages.set("Count", Object::Integer(page_refs.len() as i64));
    Ok(())
}

fn remap_refs(object: Object, offset: u32) -> Object {
    match object {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(items) => {
            Object::Array(items.into_iter().map(|o| remap_refs(o, offset)).collect())
        }
        Object::Dictionary(dict) => Object::Dictionary(remap_dict(dict, offset)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dict(stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dict(mut dict: Dictionary, offset: u32) -> Dictionary {
    for (_, value) in dict.iter_mut() {
        *value = remap_refs(std::mem::replace(value, Object::Null), offset);
    }
    dict
}
