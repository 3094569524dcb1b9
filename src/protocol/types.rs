//! PostgreSQL Type OID Constants
//!
//! Reference: https://github.com/postgres/postgres/blob/master/src/include/catalog/pg_type.dat

/// Type identifier from the server catalogue.
pub type Oid = u32;

/// PostgreSQL Type OIDs
pub mod oid {
    use super::Oid;

    /// Unspecified type. Parameters sent with it let the server infer the type.
    pub const INVALID: Oid = 0;

    // Boolean
    pub const BOOL: Oid = 16;

    // Bytes
    pub const BYTEA: Oid = 17;

    // Characters
    pub const CHAR: Oid = 18;
    pub const NAME: Oid = 19;

    // Integers
    pub const INT8: Oid = 20; // bigint
    pub const INT2: Oid = 21; // smallint
    pub const INT4: Oid = 23; // integer

    // Text
    pub const TEXT: Oid = 25;
    pub const VARCHAR: Oid = 1043;
    pub const BPCHAR: Oid = 1042; // blank-padded char

    // OID
    pub const OID: Oid = 26;

    // JSON
    pub const JSON: Oid = 114;
    pub const JSONB: Oid = 3802;

    // Float
    pub const FLOAT4: Oid = 700;
    pub const FLOAT8: Oid = 701;

    // Numeric
    pub const NUMERIC: Oid = 1700;

    // Date/Time
    pub const DATE: Oid = 1082;
    pub const TIMESTAMP: Oid = 1114;

    // UUID
    pub const UUID: Oid = 2950;

    // Arrays
    pub const BOOL_ARRAY: Oid = 1000;
    pub const BYTEA_ARRAY: Oid = 1001;
    pub const INT2_ARRAY: Oid = 1005;
    pub const INT4_ARRAY: Oid = 1007;
    pub const TEXT_ARRAY: Oid = 1009;
    pub const VARCHAR_ARRAY: Oid = 1015;
    pub const INT8_ARRAY: Oid = 1016;
    pub const FLOAT4_ARRAY: Oid = 1021;
    pub const FLOAT8_ARRAY: Oid = 1022;
    pub const DATE_ARRAY: Oid = 1182;
    pub const TIMESTAMP_ARRAY: Oid = 1115;
    pub const NUMERIC_ARRAY: Oid = 1231;
    pub const UUID_ARRAY: Oid = 2951;
    pub const JSONB_ARRAY: Oid = 3807;
}

/// Element type paired with its array type.
const ARRAY_TYPES: &[(Oid, Oid)] = &[
    (oid::BOOL, oid::BOOL_ARRAY),
    (oid::BYTEA, oid::BYTEA_ARRAY),
    (oid::INT2, oid::INT2_ARRAY),
    (oid::INT4, oid::INT4_ARRAY),
    (oid::TEXT, oid::TEXT_ARRAY),
    (oid::VARCHAR, oid::VARCHAR_ARRAY),
    (oid::INT8, oid::INT8_ARRAY),
    (oid::FLOAT4, oid::FLOAT4_ARRAY),
    (oid::FLOAT8, oid::FLOAT8_ARRAY),
    (oid::DATE, oid::DATE_ARRAY),
    (oid::TIMESTAMP, oid::TIMESTAMP_ARRAY),
    (oid::NUMERIC, oid::NUMERIC_ARRAY),
    (oid::UUID, oid::UUID_ARRAY),
    (oid::JSONB, oid::JSONB_ARRAY),
];

const NAMES: &[(Oid, &str)] = &[
    (oid::BOOL, "bool"),
    (oid::BYTEA, "bytea"),
    (oid::CHAR, "char"),
    (oid::NAME, "name"),
    (oid::INT8, "int8"),
    (oid::INT2, "int2"),
    (oid::INT4, "int4"),
    (oid::TEXT, "text"),
    (oid::VARCHAR, "varchar"),
    (oid::BPCHAR, "bpchar"),
    (oid::OID, "oid"),
    (oid::JSON, "json"),
    (oid::JSONB, "jsonb"),
    (oid::FLOAT4, "float4"),
    (oid::FLOAT8, "float8"),
    (oid::NUMERIC, "numeric"),
    (oid::DATE, "date"),
    (oid::TIMESTAMP, "timestamp"),
    (oid::UUID, "uuid"),
    (oid::BOOL_ARRAY, "bool[]"),
    (oid::BYTEA_ARRAY, "bytea[]"),
    (oid::INT2_ARRAY, "int2[]"),
    (oid::INT4_ARRAY, "int4[]"),
    (oid::INT8_ARRAY, "int8[]"),
    (oid::TEXT_ARRAY, "text[]"),
    (oid::VARCHAR_ARRAY, "varchar[]"),
    (oid::FLOAT4_ARRAY, "float4[]"),
    (oid::FLOAT8_ARRAY, "float8[]"),
    (oid::DATE_ARRAY, "date[]"),
    (oid::TIMESTAMP_ARRAY, "timestamp[]"),
    (oid::NUMERIC_ARRAY, "numeric[]"),
    (oid::UUID_ARRAY, "uuid[]"),
    (oid::JSONB_ARRAY, "jsonb[]"),
];

/// Map OID to a human-readable type name
pub fn oid_to_name(oid: Oid) -> &'static str {
    NAMES
        .iter()
        .find(|(o, _)| *o == oid)
        .map(|(_, name)| *name)
        .unwrap_or("unknown")
}

/// Resolve a type name (or one of the usual SQL spellings) to its OID.
pub fn name_to_oid(name: &str) -> Option<Oid> {
    let lower = name.trim().to_ascii_lowercase();
    let canonical = match lower.as_str() {
        "boolean" => "bool",
        "smallint" => "int2",
        "integer" | "int" => "int4",
        "bigint" => "int8",
        "real" => "float4",
        "double precision" | "float" => "float8",
        "decimal" => "numeric",
        "character varying" => "varchar",
        "character" => "bpchar",
        "timestamp without time zone" => "timestamp",
        "unknown" => return Some(oid::INVALID),
        other => other,
    };
    NAMES
        .iter()
        .find(|(_, n)| *n == canonical)
        .map(|(o, _)| *o)
}

/// Check if an OID represents an array type
pub fn is_array_oid(oid: Oid) -> bool {
    ARRAY_TYPES.iter().any(|(_, arr)| *arr == oid)
}

/// Array type whose elements have type `element`.
pub fn array_oid_of(element: Oid) -> Option<Oid> {
    ARRAY_TYPES
        .iter()
        .find(|(elem, _)| *elem == element)
        .map(|(_, arr)| *arr)
}

/// Element type of the array type `array`.
pub fn element_oid_of(array: Oid) -> Option<Oid> {
    ARRAY_TYPES
        .iter()
        .find(|(_, arr)| *arr == array)
        .map(|(elem, _)| *elem)
}

/// Every OID this module can name, in catalogue order.
pub fn known_oids() -> impl Iterator<Item = Oid> {
    NAMES.iter().map(|(o, _)| *o)
}
