pub mod consistency;
pub mod descriptor;
pub mod document_element;
pub mod ocr_line;
pub mod omission_report;
pub mod page_record;
