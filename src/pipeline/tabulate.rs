//! Tabulation: flatten a normalized extraction into fixed-schema rows.
//!
//! The export schema is the CBP Form 7501 entry summary laid out as 80
//! columns ([`COLUMNS`]). Header fields are copied onto every row; each line
//! item yields one row per HTS classification it carries.
//!
//! The extraction agent does not use stable field names, so every column has
//! an ordered alias list and the first alias present wins. Keys the schema
//! does not know are dropped.

use crate::output::{NormalizedExtraction, Row, TableAudit};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

/// `(key, column title)` in export order.
pub const COLUMNS: &[(&str, &str)] = &[
    // Customs summary header
    ("shipment_id", "CS Shipment ID"),
    ("entry_number", "1. CS Entry Number"),
    ("entry_type", "2. CS Entry Type"),
    ("summary_date", "3. CS Summary Date"),
    ("surety_number", "4. CS Surety Number"),
    ("bond_type", "5. CS Bond Type"),
    ("port_of_entry", "6. CS Port Of Entry"),
    ("entry_date", "7. CS Entry Date"),
    ("transport_name", "8. CS Transport Name"),
    ("carrier_name", "8. CS Carrier Name"),
    ("scac_code", "8. CS SCAC Code"),
    ("voyage_number", "8. CS Voyage Number"),
    ("mode_of_transport", "9. CS Mode Of Transport"),
    ("country_of_origin", "10. CS Country Of Origin"),
    ("import_date", "11. CS Import Date"),
    ("master_bol_number", "12. CS Master BOL Number"),
    ("manufacturer_id_header", "13. CS Manufacturer ID"),
    ("export_country", "14. CS Export Country"),
    ("export_date", "15. CS Export Date"),
    ("it_number", "16. CS IT Number"),
    ("it_date", "17. CS IT Date"),
    ("missing_docs", "18. CS Missing Docs"),
    ("port_of_lading", "19. CS Port Of Lading"),
    ("port_of_unlading", "20. CS Port Of Unlading"),
    ("location_firms_code", "21. CS Location Firms Code"),
    ("consignee_id", "22. CS Consignee ID"),
    ("importer_id", "23. CS Importer ID"),
    ("ref_number", "24. CS Ref Number"),
    ("consignee_name", "25. CS Consignee Name"),
    ("importer_name", "26. CS Importer Name"),
    // Merchandise lines
    ("item_number", "27. CM Item Number"),
    ("item_country_of_origin", "27. CM Country Of Origin"),
    ("item_export_country", "27. CM Export Country Code"),
    ("free_trade", "27. CM Free Trade"),
    ("bol_number", "28. CS BOL Number"),
    ("items_description", "28. CS Items Description"),
    ("invoice_no", "28. CM Invoice No"),
    ("po_number", "28. CM PO Number"),
    ("manufacturer_id", "28. CM Manufacturer ID"),
    ("recon_value", "28. CM Recon Value"),
    ("textile_category", "28. CM Textile Category"),
    ("total_pack_qty", "28. CM Total Pack Qty"),
    ("total_pack_type", "28. CM Total Pack Type"),
    ("part_number", "28. CM Part Number"),
    ("invoice_amount", "28. CM Invoice Amount"),
    ("value_addition", "28. CM Value Addition Amount"),
    ("total_invoice_amount", "28. CM Total Invoice Amount"),
    // Duty
    ("hts_code", "29. CD HTS US Code"),
    ("hts_description", "29. CD HTS Description"),
    ("pack_type_2", "31. CM Item Pack Type 2"),
    ("pack_qty_2", "31. CM Item Pack Qty 2"),
    ("pack_type_1", "31. CM Item Pack Type 1"),
    ("pack_qty_1", "31. CM Item Pack Qty 1"),
    ("relationship", "32. CM Relationship"),
    ("item_charges", "32. CM Item Charges"),
    ("entered_value", "32. CM Item Entered Value"),
    ("first_sale", "32. CM First Sale"),
    ("hmf_rate_header", "33. CS HMF Rate"),
    ("hmf_fee_header", "33. CS HMF Fee"),
    ("hts_rate", "33. CD HTS US Rate"),
    ("ad_valorem_duty", "34. CD Ad Valorem Duty"),
    ("cotton_fee_rate", "33. CD Cotton Fee Rate"),
    ("cotton_fee_amount", "34. CD Cotton Fee Amount"),
    ("mpf_rate", "33. CD MPF Rate"),
    ("mpf_fee", "34. CD MPF Fee"),
    ("hmf_rate", "33. CD HMF Rate"),
    ("hmf_fee", "34. CD HMF Fee"),
    ("specific_rate", "33. CD Specific Rate"),
    ("specific_duty", "34. CD Specific Duty"),
    ("duty_and_taxes", "34. CD Duty And Taxes"),
    // Totals
    ("total_entered_value", "35. CS Total Entered Value"),
    ("totals_duty", "37. CS Totals Duty"),
    ("totals_tax", "38. CS Totals Tax"),
    ("mpf_amount", "39. CS MPF Amount"),
    ("cotton_amount", "39. CS Cotton Amount"),
    ("total_other_fees", "39. CS Total Other Fees"),
    ("duty_grand_total", "40. CS Duty Grand Total"),
    // Declarant and broker
    ("declarant_name", "41. CS Declarant Name"),
    ("broker_name", "42. CS Broker Name"),
    ("broker_code", "43. CS Broker Code"),
];

/// Columns whose blanks are reported by [`audit`].
pub const CRITICAL_COLUMNS: &[&str] = &["entry_number", "hts_code", "item_number"];

type Aliases = &'static [(&'static str, &'static [&'static str])];

const HEADER_ALIASES: Aliases = &[
    ("shipment_id", &["shipment_id", "shipment_number"]),
    ("entry_number", &["filer_code_entry_no", "filer_code_entry_number", "entry_number", "entry_no"]),
    ("entry_type", &["entry_type", "type"]),
    ("summary_date", &["summary_date", "filing_date"]),
    ("surety_number", &["surety_number", "surety_no"]),
    ("bond_type", &["bond_type"]),
    ("port_of_entry", &["port_code", "port_of_entry", "entry_port"]),
    ("entry_date", &["entry_date"]),
    ("transport_name", &["transport_name"]),
    ("carrier_name", &["importing_carrier", "carrier_name", "carrier"]),
    ("scac_code", &["scac_code", "scac"]),
    ("voyage_number", &["voyage_number", "voyage_no", "voyage"]),
    ("mode_of_transport", &["mode_of_transport", "transport_mode"]),
    ("country_of_origin", &["country_of_origin", "origin_country"]),
    ("import_date", &["import_date"]),
    ("master_bol_number", &["bl_awb_no", "bl_awb_number", "b_l_or_awb_no", "master_bol", "bol_awb_no"]),
    ("manufacturer_id_header", &["manufacturer_id"]),
    ("export_country", &["exporting_country", "export_country"]),
    ("export_date", &["export_date"]),
    ("it_number", &["it_number", "it_no"]),
    ("it_date", &["it_date"]),
    ("missing_docs", &["missing_docs", "missing_documents"]),
    ("port_of_lading", &["port_of_lading", "lading_port", "foreign_port_of_lading"]),
    ("port_of_unlading", &["us_port_of_unlading", "port_of_unlading", "unlading_port"]),
    (
        "location_firms_code",
        &["location_of_goods", "location_of_goods_go_number", "location_code", "firms_code"],
    ),
    ("consignee_id", &["consignee_no", "consignee_number", "consignee_id"]),
    ("importer_id", &["importer_no", "importer_number", "importer_id"]),
    ("ref_number", &["ref_number", "reference_number"]),
    (
        "consignee_name",
        &["ultimate_consignee_name", "ultimate_consignee_name_address", "consignee_name"],
    ),
    (
        "importer_name",
        &["importer_of_record_name", "importer_of_record_name_address", "importer_name"],
    ),
    ("total_entered_value", &["total_entered_value", "entered_value_usd", "total_value"]),
    ("totals_duty", &["duty", "total_duty"]),
    ("totals_tax", &["tax", "total_tax"]),
    ("mpf_amount", &["mpf_amount", "mpf", "merchandise_processing_fee_total"]),
    ("cotton_amount", &["cotton_amount", "cotton_fee"]),
    ("total_other_fees", &["other", "other_fees", "total_other_fees"]),
    ("duty_grand_total", &["total", "grand_total"]),
    ("declarant_name", &["declarant_name"]),
    ("broker_name", &["broker_filer_information", "broker_name"]),
    ("broker_code", &["broker_importer_file_no", "broker_importer_file_number", "broker_code"]),
    ("hmf_rate_header", &["hmf_rate", "harbor_maintenance_fee_rate"]),
    ("hmf_fee_header", &["hmf_fee", "hmf", "harbor_maintenance_fee"]),
];

const LINE_ALIASES: Aliases = &[
    ("hts_code", &["htsus_no", "hts_code", "hts", "hs_code", "hts_us_no", "hts_code_a"]),
    (
        "hts_description",
        &[
            "description",
            "hts_description",
            "item_description",
            "desc",
            "description_of_merchandise",
            "product_description",
        ],
    ),
    ("part_number", &["part_number", "part_no", "item_no", "party_number", "item_number", "p_n"]),
    ("invoice_no", &["invoice_number", "invoice_no"]),
    ("po_number", &["po_number", "po_no", "purchase_order"]),
    ("manufacturer_id", &["manufacturer_id", "mfg_id"]),
    ("entered_value", &["entered_value", "value", "entered_val", "amount", "entered_value_a"]),
    ("pack_qty_1", &["gross_weight", "weight", "wt", "qty1", "grossweight_a"]),
    ("pack_type_1", &["weight_unit", "wt_unit", "unit1", "net_quantity_in_htsus_units"]),
    ("pack_qty_2", &["quantity", "qty", "qty2"]),
    ("pack_type_2", &["qty_unit", "unit", "unit2"]),
    ("relationship", &["relationship", "rel", "related"]),
    ("item_charges", &["charges", "charge_code", "chgs", "chgs_b", "charge_type"]),
    (
        "hts_rate",
        &["htsus_rate", "hts_rate", "duty_rate", "rate", "hts_us_rate", "hts_us_a_rate"],
    ),
    (
        "duty_and_taxes",
        &[
            "duty_and_ir_tax",
            "duty_and_tax",
            "total_duty",
            "duty",
            "duty_amount",
            "duty_and_ir_tax_dollars",
            "duty_and_ir_tax_cents",
        ],
    ),
    ("item_country_of_origin", &["country_of_origin", "origin_country"]),
    ("item_export_country", &["export_country", "exporting_country"]),
    ("invoice_amount", &["invoice_amount", "invoice_value"]),
    ("recon_value", &["recon_value", "reconciliation_value"]),
    ("textile_category", &["textile_category", "textile_cat"]),
    ("mpf_rate", &["mpf_rate", "merchandise_processing_fee_rate"]),
    (
        "mpf_fee",
        &["mpf_fee", "mpf", "merchandise_processing_fee_tax", "merchandise_processing_fee"],
    ),
    ("free_trade", &["free_trade", "free_trade_agreement", "fta"]),
    ("bol_number", &["bol_number", "bol_no", "bill_of_lading", "b_l_no"]),
    ("items_description", &["items_description", "merchandise_description", "item_desc"]),
    ("total_pack_qty", &["total_pack_qty", "total_quantity", "total_qty"]),
    ("total_pack_type", &["total_pack_type", "total_pack_unit", "total_unit"]),
    ("value_addition", &["value_addition", "value_addition_amount", "added_value"]),
    (
        "total_invoice_amount",
        &["total_invoice_amount", "total_invoice_value", "invoice_total"],
    ),
    ("first_sale", &["first_sale", "first_sale_price"]),
    ("cotton_fee_rate", &["cotton_fee_rate", "cotton_rate"]),
    ("cotton_fee_amount", &["cotton_fee_amount", "cotton_fee", "cotton"]),
    ("specific_rate", &["specific_rate", "specific_duty_rate"]),
    ("specific_duty", &["specific_duty", "specific_duty_amount"]),
];

const HTS_ALIASES: Aliases = &[
    ("hts_code", &["htsus_no", "hts_code", "hts", "hs_code"]),
    ("hts_description", &["description", "hts_description"]),
    ("hts_rate", &["htsus_rate", "hts_rate", "duty_rate", "rate"]),
    ("ad_valorem_duty", &["ad_valorem_duty", "duty"]),
    (
        "duty_and_taxes",
        &["duty_and_ir_tax", "duty_and_tax", "total_duty", "duty", "duty_amount"],
    ),
    ("entered_value", &["entered_value", "value", "entered_val", "amount"]),
    ("cotton_fee_rate", &["cotton_fee_rate", "cotton_rate"]),
    ("cotton_fee_amount", &["cotton_fee", "cotton", "cotton_fee_amount"]),
    ("mpf_fee", &["mpf_fee", "mpf"]),
    ("mpf_rate", &["mpf_rate", "merchandise_processing_fee_rate"]),
    ("hmf_fee", &["hmf_fee", "hmf"]),
    ("hmf_rate", &["hmf_rate", "harbor_maintenance_fee_rate"]),
    ("specific_rate", &["specific_rate", "specific_duty_rate"]),
    ("specific_duty", &["specific_duty", "specific_duty_amount"]),
];

static INVOICE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[Cc]ommercial [Ii]nvoice #?:?\s*(\d+)").expect("static regex"));

/// Title for a column key.
pub fn column_title(key: &str) -> Option<&'static str> {
    COLUMNS.iter().find(|(k, _)| *k == key).map(|(_, t)| *t)
}

/// Flatten a normalized extraction into rows.
pub fn tabulate(extraction: &NormalizedExtraction) -> Vec<Row> {
    let entry = header_source(&extraction.header);
    let nested_items;
    let items: &[Value] = if extraction.line_items.is_empty() {
        nested_items = entry
            .get("line_items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        &nested_items
    } else {
        &extraction.line_items
    };

    let header = header_cells(entry, items);
    let kept: Vec<&Map<String, Value>> = items
        .iter()
        .filter_map(Value::as_object)
        .filter(|item| keep_line_item(item))
        .collect();
    debug!("Tabulating {} of {} line items", kept.len(), items.len());

    let mut rows = Vec::new();
    let mut current_line: Option<Value> = None;

    for (idx, item) in kept.iter().enumerate() {
        if let Some(line) = first_truthy(item, &["line_number", "line_no", "line_item_number"]) {
            current_line = Some(line.clone());
        }
        let item_number = current_line
            .clone()
            .unwrap_or_else(|| Value::String(format!("{:03}", idx + 1)));

        let mut base = header.clone();
        base.insert("item_number".into(), item_number);
        base.extend(line_cells(item));

        match item.get("primary_hts") {
            Some(Value::Object(primary)) if !primary.is_empty() => {
                let mut row = base.clone();
                row.extend(hts_cells(primary));
                if let Some(Value::Object(qty)) = primary.get("quantity") {
                    row.insert("pack_qty_2".into(), qty.get("value").cloned().unwrap_or(empty()));
                    row.insert("pack_type_2".into(), qty.get("unit").cloned().unwrap_or(empty()));
                }
                for (field, key) in [
                    ("entered_value", "entered_value"),
                    ("rate", "hts_rate"),
                    ("duty_amount", "duty_and_taxes"),
                ] {
                    if let Some(v) = primary.get(field) {
                        row.insert(key.into(), v.clone());
                    }
                }
                rows.push(row);

                if let Some(Value::Array(additional)) = primary.get("additional_hts_codes") {
                    for extra in additional.iter().filter_map(Value::as_object) {
                        let mut row = base.clone();
                        row.extend(hts_cells(extra));
                        rows.push(row);
                    }
                }
            }
            _ => match item.get("hts_classifications") {
                Some(Value::Array(classes)) if !classes.is_empty() => {
                    for hts in classes.iter().filter_map(Value::as_object) {
                        let mut row = base.clone();
                        row.extend(hts_cells(hts));
                        rows.push(row);
                    }
                }
                _ => rows.push(base),
            },
        }
    }

    debug!("Generated {} rows", rows.len());
    rows
}

/// Count rows and report blank critical columns.
pub fn audit(rows: &[Row]) -> TableAudit {
    let mut audit = TableAudit {
        rows: rows.len(),
        columns: COLUMNS.len(),
        ..TableAudit::default()
    };
    if rows.is_empty() {
        audit.warnings.push("no rows were produced".into());
        return audit;
    }
    for key in CRITICAL_COLUMNS {
        let blank = rows.iter().filter(|r| r.get(*key).is_none_or(is_blank)).count();
        if blank > 0 {
            let title = column_title(key).unwrap_or(*key);
            audit.empty_critical.push((key.to_string(), blank));
            audit
                .warnings
                .push(format!("{title}: empty in {blank} of {} rows", rows.len()));
        }
    }
    audit
}

// ── Header ───────────────────────────────────────────────────────────────

fn header_source(header: &Map<String, Value>) -> &Map<String, Value> {
    if let Some(Value::Object(entry)) = header.get("entry_summary") {
        return entry;
    }
    if let Some(Value::Object(entry)) = header
        .get("data")
        .and_then(|d| d.get("entry_summary"))
    {
        return entry;
    }
    header
}

fn header_cells(entry: &Map<String, Value>, items: &[Value]) -> Row {
    let mut row = Row::new();
    for (key, aliases) in HEADER_ALIASES {
        let Some(value) = first_present(entry, aliases) else {
            continue;
        };
        match value {
            Value::Object(obj) => {
                if let Some(name) = obj.get("name") {
                    row.insert(key.to_string(), name.clone());
                }
            }
            Value::Null => {}
            other => {
                row.insert(key.to_string(), other.clone());
            }
        }
    }

    if !row.contains_key("invoice_no") {
        if let Some(number) = invoice_number(items) {
            debug!("Invoice number from header line: {}", number);
            row.insert("invoice_no".into(), Value::String(number));
        }
    }
    row
}

/// Invoice number printed on an `INV…` header line.
pub fn invoice_number(items: &[Value]) -> Option<String> {
    items.iter().filter_map(Value::as_object).find_map(|item| {
        let line_no = item.get("line_no").and_then(Value::as_str).unwrap_or("");
        let description = item
            .get("description_of_merchandise")
            .and_then(Value::as_str)
            .unwrap_or("");
        if !line_no.to_ascii_uppercase().starts_with("INV") || !mentions_invoice(description) {
            return None;
        }
        INVOICE_NUMBER
            .captures(description)
            .map(|c| c[1].to_string())
    })
}

fn mentions_invoice(text: &str) -> bool {
    text.to_ascii_uppercase().contains("COMMERCIAL INVOICE #:")
}

// ── Line items ───────────────────────────────────────────────────────────

fn keep_line_item(item: &Map<String, Value>) -> bool {
    let line_no = first_truthy(item, &["line_no", "line_item_number"]);
    let line_no_str = line_no.and_then(Value::as_str).unwrap_or("");
    let description = first_truthy(item, &["description_of_merchandise", "description"])
        .and_then(Value::as_str)
        .unwrap_or("");

    if line_no_str.to_ascii_uppercase().starts_with("INV") || mentions_invoice(description) {
        debug!("Skipping invoice header line {:?}", line_no_str);
        return false;
    }

    let primary = item.get("primary_hts").and_then(Value::as_object);
    let has_value = item.get("entered_value").is_some_and(|v| !v.is_null())
        || primary
            .and_then(|p| p.get("entered_value"))
            .is_some_and(|v| !v.is_null());
    let has_hts = first_truthy(item, &["htsus_no", "a_htsus_no", "hts_code", "hts_us_no"]).is_some()
        || primary.is_some_and(|p| first_truthy(p, &["hts_code", "htsus_no"]).is_some());
    let numeric_line = !line_no_str.is_empty() && line_no_str.chars().all(|c| c.is_ascii_digit());

    let keep = has_value || has_hts || primary.is_some() || numeric_line;
    if !keep {
        debug!("Skipping line without value or HTS code: {:?}", line_no_str);
    }
    keep
}

fn line_cells(item: &Map<String, Value>) -> Row {
    let mut row = Row::new();
    for (key, aliases) in LINE_ALIASES {
        if let Some(value) = first_present(item, aliases).filter(|v| !v.is_null()) {
            let value = match free_value(key, value, Value::String("0.00".into())) {
                Value::String(s) if s.chars().any(|c| c.is_ascii_digit()) => {
                    Value::String(s.replace(',', ""))
                }
                other => other,
            };
            row.insert(key.to_string(), value);
        }
    }

    if let Some(Value::Object(mpf)) = item.get("mpf") {
        apply_nested_mpf(&mut row, mpf);
    }

    let flat_amount = first_truthy(
        item,
        &["mpf_amount", "mpf", "merchandise_processing_fee", "merchandise_processing_fee_tax"],
    )
    .filter(|v| !v.is_object());
    let flat_rate = first_truthy(item, &["mpf_rate", "merchandise_processing_fee_rate"]);
    let flat_code = first_truthy(item, &["mpf_hts_code", "mpf_hts", "merchandise_processing_fee_hts"]);

    if let Some(amount) = flat_amount {
        row.insert("mpf_fee".into(), amount.clone());
    }
    if let Some(rate) = flat_rate {
        row.insert("mpf_rate".into(), rate.clone());
        row.entry("hts_rate").or_insert_with(|| rate.clone());
    }
    if let Some(code) = flat_code {
        apply_mpf_hts_code(&mut row, code);
    }
    row
}

fn hts_cells(hts: &Map<String, Value>) -> Row {
    let mut row = Row::new();
    for (key, aliases) in HTS_ALIASES {
        if let Some(value) = first_present(hts, aliases).filter(|v| !v.is_null()) {
            row.insert(key.to_string(), free_value(key, value, Value::from(0.0)));
        }
    }

    for field in ["quantity", "net_quantity"] {
        if let Some(Value::Object(qty)) = hts.get(field) {
            row.insert("pack_qty_2".into(), qty.get("value").cloned().unwrap_or(empty()));
            row.insert("pack_type_2".into(), qty.get("unit").cloned().unwrap_or(empty()));
        }
    }
    match hts.get("gross_weight") {
        Some(Value::Object(gw)) => {
            row.insert("pack_qty_1".into(), gw.get("value").cloned().unwrap_or(empty()));
            row.insert(
                "pack_type_1".into(),
                gw.get("unit").cloned().unwrap_or_else(|| Value::String("KG".into())),
            );
        }
        Some(gw) => {
            row.insert("pack_qty_1".into(), gw.clone());
        }
        None => {}
    }

    if let Some(Value::Object(mpf)) = hts.get("mpf") {
        apply_nested_mpf(&mut row, mpf);
    }

    let description = first_present(hts, &["description", "hts_description"]).and_then(Value::as_str);
    if description.is_some_and(|d| d.contains("Merchandise Processing Fee")) {
        if let Some(rate) = row.get("mpf_rate").cloned() {
            row.insert("hts_rate".into(), rate);
        }
    }
    row
}

fn apply_nested_mpf(row: &mut Row, mpf: &Map<String, Value>) {
    if let Some(amount) = mpf.get("mpf_amount") {
        row.insert("mpf_fee".into(), amount.clone());
    }
    if let Some(rate) = mpf.get("mpf_hts_rate") {
        row.insert("mpf_rate".into(), rate.clone());
        row.entry("hts_rate").or_insert_with(|| rate.clone());
    }
    if let Some(code) = mpf.get("mpf_hts_code") {
        apply_mpf_hts_code(row, code);
    }
}

/// An MPF HTS code replaces the row's HTS code only when it is a full
/// 10-digit classification.
fn apply_mpf_hts_code(row: &mut Row, code: &Value) {
    let digits = match code {
        Value::String(s) => s.replace('.', "").len(),
        other => other.to_string().replace('.', "").len(),
    };
    if digits >= 10 {
        row.insert("hts_code".into(), code.clone());
    }
}

/// `FREE` stays `FREE` in rate columns and becomes `zero` in duty or amount columns.
fn free_value(key: &str, value: &Value, zero: Value) -> Value {
    match value {
        Value::String(s) if s.eq_ignore_ascii_case("FREE") => {
            if key.contains("rate") {
                Value::String("FREE".into())
            } else if key.contains("duty") || key.contains("amount") {
                zero
            } else {
                value.clone()
            }
        }
        other => other.clone(),
    }
}

// ── Value helpers ────────────────────────────────────────────────────────

fn empty() -> Value {
    Value::String(String::new())
}

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k))
}

fn first_truthy<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| map.get(*k)).find(|v| is_truthy(v))
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::normalize;
    use serde_json::json;

    fn rows_for(raw: Value) -> Vec<Row> {
        tabulate(&normalize(&raw))
    }

    #[test]
    fn schema_has_eighty_unique_columns() {
        assert_eq!(COLUMNS.len(), 80);
        let mut keys: Vec<_> = COLUMNS.iter().map(|(k, _)| *k).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 80);
        assert_eq!(COLUMNS[0], ("shipment_id", "CS Shipment ID"));
        assert_eq!(COLUMNS[79], ("broker_code", "43. CS Broker Code"));
    }

    #[test]
    fn every_alias_target_is_a_column() {
        for (key, _) in HEADER_ALIASES.iter().chain(LINE_ALIASES).chain(HTS_ALIASES) {
            assert!(column_title(key).is_some(), "{key} is not a column");
        }
    }

    #[test]
    fn header_is_copied_to_every_row() {
        let rows = rows_for(json!({"entry_summary": {
            "filer_code_entry_no": "ABC-123",
            "importer_of_record_name": {"name": "ACME", "address": "1 Road"},
            "line_items": [
                {"line_number": "001", "hts_code": "6910.10.0030", "entered_value": "1,200"},
                {"line_number": "002", "hts_code": "8486.90.0000", "entered_value": "50"}
            ]
        }}));
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row["entry_number"], "ABC-123");
            assert_eq!(row["importer_name"], "ACME");
        }
        assert_eq!(rows[0]["entered_value"], "1200");
        assert_eq!(rows[1]["item_number"], "002");
    }

    #[test]
    fn primary_and_additional_hts_expand_rows() {
        let rows = rows_for(json!({"line_items": [{
            "line_number": "001",
            "description": "ceramic sinks",
            "primary_hts": {
                "hts_code": "6910.10.0030",
                "entered_value": 1000,
                "rate": "FREE",
                "duty_amount": 0,
                "quantity": {"value": 12, "unit": "NO"},
                "additional_hts_codes": [
                    {"hts_code": "9903.01.24", "rate": "10%", "duty_amount": 100},
                    {"hts_code": "9903.01.25", "rate": "FREE", "duty": "FREE"}
                ]
            }
        }]}));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["hts_code"], "6910.10.0030");
        assert_eq!(rows[0]["pack_qty_2"], 12);
        assert_eq!(rows[0]["hts_rate"], "FREE");
        assert_eq!(rows[1]["hts_code"], "9903.01.24");
        assert_eq!(rows[1]["hts_rate"], "10%");
        assert_eq!(rows[2]["hts_rate"], "FREE");
        assert_eq!(rows[2]["duty_and_taxes"], json!(0.0));
        assert!(rows.iter().all(|r| r["item_number"] == "001"));
    }

    #[test]
    fn hts_classifications_expand_rows() {
        let rows = rows_for(json!([{
            "line_no": "1",
            "hts_classifications": [
                {"hts_code": "1111.11.1111"},
                {"hts_code": "2222.22.2222"}
            ]
        }]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["hts_code"], "2222.22.2222");
    }

    #[test]
    fn invoice_header_lines_are_filtered_and_fill_invoice_no() {
        let rows = rows_for(json!({"items": [
            {"line_no": "INV#1", "description_of_merchandise": "Commercial Invoice #: 98765"},
            {"line_no": "001", "hts_code": "6910.10.0030"},
            {"line_no": "TOTAL", "description": "summary"}
        ]}));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["invoice_no"], "98765");
    }

    #[test]
    fn item_number_defaults_to_padded_index() {
        let rows = rows_for(json!([{"hts_code": "1"}, {"hts_code": "2"}]));
        assert_eq!(rows[0]["item_number"], "001");
        assert_eq!(rows[1]["item_number"], "002");
    }

    #[test]
    fn free_in_line_duty_becomes_zero_string() {
        let rows = rows_for(json!([{"line_no": "1", "duty": "FREE", "rate": "free"}]));
        assert_eq!(rows[0]["duty_and_taxes"], "0.00");
        assert_eq!(rows[0]["hts_rate"], "FREE");
    }

    #[test]
    fn nested_mpf_requires_ten_digit_code() {
        let rows = rows_for(json!([
            {"line_no": "1", "hts_code": "1234.56.7890",
             "mpf": {"mpf_amount": 25.5, "mpf_hts_rate": "0.3464%", "mpf_hts_code": "499"}},
            {"line_no": "2",
             "mpf": {"mpf_amount": 1, "mpf_hts_code": "4999.99.9999"}}
        ]));
        assert_eq!(rows[0]["mpf_fee"], json!(25.5));
        assert_eq!(rows[0]["mpf_rate"], "0.3464%");
        assert_eq!(rows[0]["hts_rate"], "0.3464%");
        assert_eq!(rows[0]["hts_code"], "1234.56.7890");
        assert_eq!(rows[1]["hts_code"], "4999.99.9999");
    }

    #[test]
    fn mpf_description_copies_rate() {
        let rows = rows_for(json!([{
            "line_no": "1",
            "hts_classifications": [{
                "description": "Merchandise Processing Fee",
                "hts_rate": "x",
                "mpf_rate": "0.3464%"
            }]
        }]));
        assert_eq!(rows[0]["hts_rate"], "0.3464%");
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let rows = rows_for(json!([{"line_no": "1", "hts_code": "1", "mystery": "x"}]));
        assert!(rows[0].keys().all(|k| column_title(k).is_some()));
    }

    #[test]
    fn data_wrapped_entry_summary_is_found() {
        let rows = rows_for(json!({"data": {"entry_summary": {
            "entry_type": "01",
            "line_items": [{"line_no": "1", "hts_code": "1"}]
        }}}));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["entry_type"], "01");
    }

    #[test]
    fn audit_reports_blank_critical_columns() {
        let rows = rows_for(json!([{"line_no": "1", "hts_code": "1"}]));
        let a = audit(&rows);
        assert_eq!(a.rows, 1);
        assert_eq!(a.columns, 80);
        assert_eq!(a.empty_critical, vec![("entry_number".to_string(), 1)]);
        assert!(audit(&[]).warnings[0].contains("no rows"));
    }
}
