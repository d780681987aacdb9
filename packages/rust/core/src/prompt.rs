//! Matching-prompt assembly.

/// Build the instruction for the matching assistant, embedding the vendor
/// line items and the catalog data verbatim between labeled delimiters.
///
/// No delimiter escaping is performed; inputs are assumed not to contain
/// the marker text.
pub fn build_matching_prompt(vendor_data: &str, catalog_data: &str) -> String {
    format!(
        "Here is the invoice data that is read from vendor invoice:\n\
         -- VENDOR DATA STARTS HERE --\n\
         \n\
         {vendor_data}\n\
         \n\
         -- VENDOR DATA ENDS HERE --\n\
         \n\
         And, here is the product data from Buzzebees database:\n\
         -- BUZZEBEES DATA STARTS HERE --\n\
         \n\
         {catalog_data}\n\
         \n\
         -- BUZZEBEES DATA ENDS HERE --\n\
         \n\
         Please provide the matching result in JSON format.\n\
         Response only JSON output, no explanation is required.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_both_payloads_between_markers() {
        let prompt = build_matching_prompt("SKU A1 Widget x3", "B9,Widget Pro");

        let vendor_start = prompt.find("-- VENDOR DATA STARTS HERE --").unwrap();
        let vendor_end = prompt.find("-- VENDOR DATA ENDS HERE --").unwrap();
        let vendor_body = &prompt[vendor_start..vendor_end];
        assert!(vendor_body.contains("SKU A1 Widget x3"));

        let catalog_start = prompt.find("-- BUZZEBEES DATA STARTS HERE --").unwrap();
        let catalog_end = prompt.find("-- BUZZEBEES DATA ENDS HERE --").unwrap();
        let catalog_body = &prompt[catalog_start..catalog_end];
        assert!(catalog_body.contains("B9,Widget Pro"));
    }

    #[test]
    fn ends_with_json_only_instruction() {
        let prompt = build_matching_prompt("a", "b");
        assert!(prompt.trim_end().ends_with("no explanation is required."));
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(
            build_matching_prompt("x", "y"),
            build_matching_prompt("x", "y")
        );
    }
}
