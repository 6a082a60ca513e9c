pub mod stored_document;
