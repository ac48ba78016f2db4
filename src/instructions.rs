//! Extraction instructions sent alongside each document.
//!
//! The remote agent is a general-purpose document parser; these instructions
//! steer it towards the CBP Form 7501 entry-summary shape that
//! [`crate::pipeline::tabulate`] understands. Callers override them via
//! [`crate::config::ExtractionConfig::instructions`].

/// Default instructions for CBP Form 7501 entry summaries.
pub const DEFAULT_INSTRUCTIONS: &str = r#"CBP Form 7501 Entry Summary - structured extraction

Return a single JSON object:

{
  "entry_summary": {
    "filer_code_entry_no": "...",
    "entry_type": "...",
    "summary_date": "MM/DD/YYYY",
    "surety_number": "...",
    "bond_type": "...",
    "port_code": "...",
    "entry_date": "MM/DD/YYYY",
    "importing_carrier": "...",
    "mode_of_transport": "...",
    "country_of_origin": "...",
    "import_date": "MM/DD/YYYY",
    "bl_awb_no": "...",
    "exporting_country": "...",
    "export_date": "MM/DD/YYYY",
    "us_port_of_unlading": "...",
    "location_of_goods": "...",
    "consignee_no": "...",
    "importer_no": "...",
    "ultimate_consignee_name": {"name": "...", "address": "..."},
    "importer_of_record_name": {"name": "...", "address": "..."},
    "total_entered_value": "...",
    "duty": "...", "tax": "...", "other": "...", "total": "...",
    "declarant_name": "...",
    "broker_filer_information": "...",
    "broker_importer_file_no": "...",
    "line_items": [ ... ]
  }
}

RULES

1. Primary HTS. Each line item has exactly one primary_hts object whose
   hts_code is the 10-digit merchandise classification (for example
   6910.10.0030). Codes starting with "99" are never primary.

2. Additional HTS. Every 99-series code for a line goes in
   primary_hts.additional_hts_codes[], never at line-item level. Each entry
   carries hts_code, description, rate and duty_amount.

3. Fees. MPF and HMF go under primary_hts.fees or as an "mpf" object
   {mpf_amount, mpf_hts_rate, mpf_hts_code}. Fees never appear inside
   additional_hts_codes.

4. charge_type appears only at line-item level.

5. Line numbers. Use the printed line number ("001", "002", ...) as
   line_number. Invoice header lines ("INV#1 Commercial Invoice #: 12345")
   keep their "INV" line_no so they can be recognised.

6. Values. Copy amounts as printed without currency symbols. A rate printed
   as FREE stays "FREE". Do not compute totals that are not on the form.

7. Quantities. Use {"value": ..., "unit": ...} objects for quantity,
   net_quantity and gross_weight.

8. Output JSON only, with no commentary and no Markdown fences.
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_instructions_name_the_expected_keys() {
        for key in ["entry_summary", "line_items", "primary_hts", "additional_hts_codes", "mpf_hts_code"] {
            assert!(DEFAULT_INSTRUCTIONS.contains(key), "missing {key}");
        }
    }
}
