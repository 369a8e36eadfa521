use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{RefundAmount, RefundDraft, SensitiveString};

pub const REQUIRED: &str = "This field is required.";
pub const NOT_A_NUMBER: &str = "Enter a number.";
pub const BELOW_MINIMUM: &str = "Ensure this value is greater than or equal to 0.01.";

const MAX_DECIMAL_PLACES: usize = 2;
const MAX_WHOLE_DIGITS: usize = 8;

/// How a submitted value is normalized before it reaches the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text { max_length: usize },
    Amount,
}

/// One entry of the refund form schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    /// Whether the raw value may be written back into a re-rendered form.
    pub echo: bool,
    pub input_type: &'static str,
}

pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "recipient_name",
        label: "Recipient name",
        kind: FieldKind::Text { max_length: 100 },
        echo: true,
        input_type: "text",
    },
    FieldSpec {
        name: "refund_amount",
        label: "Refund amount",
        kind: FieldKind::Amount,
        echo: true,
        input_type: "text",
    },
    FieldSpec {
        name: "bank_name",
        label: "Bank name",
        kind: FieldKind::Text { max_length: 100 },
        echo: true,
        input_type: "text",
    },
    FieldSpec {
        name: "account_number",
        label: "Account number",
        kind: FieldKind::Text { max_length: 34 },
        echo: false,
        input_type: "text",
    },
    FieldSpec {
        name: "card_number",
        label: "Card number",
        kind: FieldKind::Text { max_length: 19 },
        echo: false,
        input_type: "text",
    },
    FieldSpec {
        name: "expiry_date",
        label: "Expiry date",
        kind: FieldKind::Text { max_length: 7 },
        echo: true,
        input_type: "text",
    },
    FieldSpec {
        name: "cvv",
        label: "CVV",
        kind: FieldKind::Text { max_length: 4 },
        echo: false,
        input_type: "password",
    },
];

/// Raw key/value pairs as submitted by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct RawFields(BTreeMap<String, String>);

impl RawFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for RawFields
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Per-field validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for FieldErrors {}

/// Validates and normalizes a submission against [`FIELDS`].
pub fn validate(raw: &RawFields) -> Result<RefundDraft, FieldErrors> {
    let mut errors = FieldErrors::default();
    let mut text = BTreeMap::new();
    let mut amount = None;

    for spec in FIELDS {
        let value = raw.get(spec.name).map(str::trim).unwrap_or_default();
        if value.is_empty() {
            errors.add(spec.name, REQUIRED);
            continue;
        }

        match spec.kind {
            FieldKind::Text { max_length } => {
                let length = value.chars().count();
                if length > max_length {
                    errors.add(
                        spec.name,
                        format!(
                            "Ensure this value has at most {max_length} characters (it has {length})."
                        ),
                    );
                } else {
                    text.insert(spec.name, value.to_string());
                }
            }
            FieldKind::Amount => match parse_amount(value) {
                Ok(parsed) => amount = Some(parsed),
                Err(messages) => {
                    for message in messages {
                        errors.add(spec.name, message);
                    }
                }
            },
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut take = |name: &str| text.remove(name).unwrap_or_default();
    Ok(RefundDraft {
        recipient_name: take("recipient_name"),
        refund_amount: amount.unwrap_or(RefundAmount::from_minor_units(0)),
        bank_name: take("bank_name"),
        account_number: SensitiveString::new(take("account_number")),
        card_number: SensitiveString::new(take("card_number")),
        expiry_date: SensitiveString::new(take("expiry_date")),
        cvv: SensitiveString::new(take("cvv")),
    })
}

/// Parses a plain decimal (`"50"`, `"50.5"`, `".75"`) into minor units.
pub fn parse_amount(raw: &str) -> Result<RefundAmount, Vec<String>> {
    let (negative, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    let well_formed = !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(vec![NOT_A_NUMBER.to_string()]);
    }

    let whole = whole.trim_start_matches('0');
    let mut errors = Vec::new();
    if fraction.len() > MAX_DECIMAL_PLACES {
        errors.push(format!(
            "Ensure that there are no more than {MAX_DECIMAL_PLACES} decimal places."
        ));
    }
    if whole.len() > MAX_WHOLE_DIGITS {
        errors.push(format!(
            "Ensure that there are no more than {MAX_WHOLE_DIGITS} digits before the decimal point."
        ));
    }
    let is_zero = whole.is_empty() && fraction.chars().all(|c| c == '0');
    if negative || is_zero {
        errors.push(BELOW_MINIMUM.to_string());
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let whole_units: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| vec![NOT_A_NUMBER.to_string()])?
    };
    let cents: i64 = format!("{fraction:0<2}")
        .parse()
        .map_err(|_| vec![NOT_A_NUMBER.to_string()])?;

    Ok(RefundAmount::from_minor_units(whole_units * 100 + cents))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_fields() -> RawFields {
        [
            ("recipient_name", "Alice"),
            ("refund_amount", "50.00"),
            ("bank_name", "Acme Bank"),
            ("account_number", "12345678"),
            ("card_number", "4111111111111111"),
            ("expiry_date", "12/26"),
            ("cvv", "123"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn accepts_complete_submission() {
        let draft = validate(&valid_fields()).expect("valid submission");
        assert_eq!(draft.recipient_name, "Alice");
        assert_eq!(draft.refund_amount.minor_units(), 5000);
        assert_eq!(draft.card_number.expose(), "4111111111111111");
        assert_eq!(draft.cvv.expose(), "123");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let mut fields = valid_fields();
        fields.insert("recipient_name", "  Alice  ");
        fields.insert("bank_name", "\tAcme Bank\n");
        let draft = validate(&fields).expect("valid submission");
        assert_eq!(draft.recipient_name, "Alice");
        assert_eq!(draft.bank_name, "Acme Bank");
    }

    #[test]
    fn reports_every_missing_field() {
        let errors = validate(&RawFields::new()).expect_err("empty submission fails");
        assert_eq!(errors.len(), FIELDS.len());
        for spec in FIELDS {
            assert_eq!(errors.field(spec.name), [REQUIRED.to_string()]);
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut fields = valid_fields();
        fields.insert("cvv", "   ");
        let errors = validate(&fields).expect_err("blank cvv fails");
        assert_eq!(errors.field("cvv"), [REQUIRED.to_string()]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn negative_amount_is_rejected() {
        let mut fields = valid_fields();
        fields.insert("refund_amount", "-5");
        let errors = validate(&fields).expect_err("negative amount fails");
        assert_eq!(errors.field("refund_amount"), [BELOW_MINIMUM.to_string()]);
        assert!(!errors.contains("recipient_name"));
    }

    #[test]
    fn zero_amount_is_rejected() {
        assert_eq!(
            parse_amount("0.00").expect_err("zero fails"),
            vec![BELOW_MINIMUM.to_string()]
        );
    }

    #[test]
    fn non_numeric_amounts_are_rejected() {
        for raw in ["abc", "1e3", "12.5.1", ".", "5,00", "NaN"] {
            assert_eq!(
                parse_amount(raw).expect_err("not a number"),
                vec![NOT_A_NUMBER.to_string()],
                "input {raw:?}"
            );
        }
    }

    #[test]
    fn amount_precision_is_bounded() {
        let errors = parse_amount("10.125").expect_err("three decimals");
        assert!(errors[0].contains("2 decimal places"));

        let errors = parse_amount("123456789").expect_err("nine whole digits");
        assert!(errors[0].contains("8 digits before the decimal point"));
    }

    #[test]
    fn parses_amount_variants() {
        assert_eq!(parse_amount("50").unwrap().minor_units(), 5000);
        assert_eq!(parse_amount("50.5").unwrap().minor_units(), 5050);
        assert_eq!(parse_amount(".75").unwrap().minor_units(), 75);
        assert_eq!(parse_amount("+0012.30").unwrap().minor_units(), 1230);
        assert_eq!(parse_amount("99999999.99").unwrap().minor_units(), 9_999_999_999);
    }

    #[test]
    fn text_fields_respect_max_length() {
        let mut fields = valid_fields();
        fields.insert("cvv", "12345");
        let errors = validate(&fields).expect_err("cvv too long");
        assert_eq!(
            errors.field("cvv"),
            ["Ensure this value has at most 4 characters (it has 5).".to_string()]
        );
    }

    #[test]
    fn sensitive_fields_are_not_echoed() {
        let hidden: Vec<&str> = FIELDS
            .iter()
            .filter(|spec| !spec.echo)
            .map(|spec| spec.name)
            .collect();
        assert_eq!(hidden, ["account_number", "card_number", "cvv"]);
    }
}
