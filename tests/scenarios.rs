use indexmap::IndexMap;
use query_doc_sql::{
    normalize_config, resolve_defaults, AggregatedField, AggregatedFieldSource, AggregationOp,
    AggregationQuery, AnyScalar, CondExpr, Condition, DataTable, Dialect, Expression,
    FieldCondition, MutationType, RawConfig, RawField, RawTableConfig,
};
use std::collections::BTreeMap;

fn sales_data_table_config(dialect: Dialect) -> query_doc_sql::Config {
    let mut tables = BTreeMap::new();
    tables.insert(
        "sales".to_string(),
        RawTableConfig {
            allowed_fields: vec![
                RawField { name: "id".to_string(), field_type: query_doc_sql::FieldType::Number, nullable: false, default: None, foreign_key: None },
                RawField { name: "amount".to_string(), field_type: query_doc_sql::FieldType::Number, nullable: false, default: None, foreign_key: None },
                RawField { name: "region".to_string(), field_type: query_doc_sql::FieldType::String, nullable: false, default: None, foreign_key: None },
                RawField { name: "customer_id".to_string(), field_type: query_doc_sql::FieldType::Number, nullable: false, default: None, foreign_key: None },
                RawField { name: "product_data".to_string(), field_type: query_doc_sql::FieldType::Object, nullable: true, default: None, foreign_key: None },
            ],
        },
    );
    normalize_config(RawConfig {
        tables,
        variables: BTreeMap::new(),
        relationships: None,
        dialect,
        data_table: Some(DataTable {
            table: "raw_data".to_string(),
            data_field: "data".to_string(),
            table_field: "table_name".to_string(),
        }),
    })
    .unwrap()
}

#[test]
fn s1_aggregation_over_data_table_json() {
    let cfg = sales_data_table_config(Dialect::Postgresql);
    let mut aggregated_fields = IndexMap::new();
    aggregated_fields.insert(
        "total_sales".to_string(),
        AggregatedField { operator: AggregationOp::Sum, field: AggregatedFieldSource::FieldName("sales.amount".to_string()), separator: None },
    );
    aggregated_fields.insert(
        "count".to_string(),
        AggregatedField { operator: AggregationOp::Count, field: AggregatedFieldSource::Star("*".to_string()), separator: None },
    );
    let query = AggregationQuery { table: "sales".to_string(), group_by: vec!["sales.region".to_string()], aggregated_fields };
    let compiled = query_doc_sql::compile_aggregation(&cfg, &query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT sales.data->>'region' AS \"region\", SUM((sales.data->>'amount')::FLOAT) AS \"total_sales\", COUNT(*) AS \"count\" FROM raw_data AS \"sales\" GROUP BY sales.data->>'region'"
    );
    assert!(compiled.params.is_empty());
}

#[test]
fn s2_conditional_arithmetic_aggregation() {
    let cfg = sales_data_table_config(Dialect::Postgresql);

    let price_multiplier = Expression::Cond {
        cond: Box::new(CondExpr {
            if_: Condition::FieldMap(IndexMap::from([(
                "sales.region".to_string(),
                FieldCondition::Implicit(Expression::Scalar(AnyScalar::String("premium".to_string()))),
            )])),
            then: Expression::Scalar(AnyScalar::Number(1.2)),
            else_: Expression::Scalar(AnyScalar::Number(1.0)),
        }),
    };
    let mut func = BTreeMap::new();
    func.insert("MULTIPLY".to_string(), vec![Expression::Field { field: "sales.amount".to_string() }, price_multiplier]);

    let mut aggregated_fields = IndexMap::new();
    aggregated_fields.insert(
        "adjusted_total".to_string(),
        AggregatedField { operator: AggregationOp::Sum, field: AggregatedFieldSource::Expr(Expression::Func { func }), separator: None },
    );
    let query = AggregationQuery { table: "sales".to_string(), group_by: vec![], aggregated_fields };
    let compiled = query_doc_sql::compile_aggregation(&cfg, &query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT SUM((sales.data->>'amount')::FLOAT * (CASE WHEN (sales.data->>'region' = $1) THEN 1.2 ELSE 1 END)) AS \"adjusted_total\" FROM raw_data AS \"sales\""
    );
    assert_eq!(compiled.params, vec![AnyScalar::String("premium".to_string())]);
}

#[test]
fn s3_json_path_alias_on_regular_config() {
    let mut tables = BTreeMap::new();
    tables.insert(
        "sales".to_string(),
        RawTableConfig {
            allowed_fields: vec![RawField {
                name: "product_data".to_string(),
                field_type: query_doc_sql::FieldType::Object,
                nullable: true,
                default: None,
                foreign_key: None,
            }],
        },
    );
    let cfg = normalize_config(RawConfig {
        tables,
        variables: BTreeMap::new(),
        relationships: None,
        dialect: Dialect::Postgresql,
        data_table: None,
    })
    .unwrap();

    let query = AggregationQuery {
        table: "sales".to_string(),
        group_by: vec!["sales.product_data->>'category'".to_string()],
        aggregated_fields: IndexMap::new(),
    };
    let compiled = query_doc_sql::compile_aggregation(&cfg, &query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT sales.product_data->>'category' AS \"product_data->category\" FROM sales GROUP BY sales.product_data->>'category'"
    );
}

#[test]
fn s4_sqlite_lowering() {
    let cfg = sales_data_table_config(Dialect::SqliteMinimal);

    let mut func = BTreeMap::new();
    func.insert("GEN_RANDOM_UUID".to_string(), vec![]);
    let mut aggregated_fields = IndexMap::new();
    aggregated_fields.insert(
        "bad".to_string(),
        AggregatedField { operator: AggregationOp::Max, field: AggregatedFieldSource::Expr(Expression::Func { func }), separator: None },
    );
    let query = AggregationQuery { table: "sales".to_string(), group_by: vec![], aggregated_fields };
    let err = query_doc_sql::compile_aggregation(&cfg, &query).unwrap_err();
    assert!(matches!(err, query_doc_sql::CompileError::DialectUnsupportedFunction { .. }));
}

#[test]
fn s5_partial_evaluator_fixed_point() {
    let mut add = BTreeMap::new();
    add.insert("ADD".to_string(), vec![Expression::Field { field: "NEW_ROW.a".to_string() }, Expression::Scalar(AnyScalar::Number(3.0))]);
    let mut multiply = BTreeMap::new();
    multiply.insert("MULTIPLY".to_string(), vec![Expression::Field { field: "NEW_ROW.b".to_string() }, Expression::Scalar(AnyScalar::Number(10.0))]);

    let mut tables = BTreeMap::new();
    tables.insert(
        "rows".to_string(),
        RawTableConfig {
            allowed_fields: vec![
                RawField { name: "a".to_string(), field_type: query_doc_sql::FieldType::Number, nullable: false, default: Some(Expression::Scalar(AnyScalar::Number(2.0))), foreign_key: None },
                RawField { name: "b".to_string(), field_type: query_doc_sql::FieldType::Number, nullable: false, default: Some(Expression::Func { func: add }), foreign_key: None },
                RawField { name: "c".to_string(), field_type: query_doc_sql::FieldType::Number, nullable: false, default: Some(Expression::Func { func: multiply }), foreign_key: None },
            ],
        },
    );
    let cfg = normalize_config(RawConfig { tables, variables: BTreeMap::new(), relationships: None, dialect: Dialect::Postgresql, data_table: None }).unwrap();

    let row = resolve_defaults(&cfg, "rows", MutationType::Insert, IndexMap::new()).unwrap();
    assert_eq!(row.get("a"), Some(&AnyScalar::Number(2.0)));
    assert_eq!(row.get("b"), Some(&AnyScalar::Number(5.0)));
    assert_eq!(row.get("c"), Some(&AnyScalar::Number(50.0)));
}

#[test]
fn s6_invalid_path_rejection() {
    let mut tables = BTreeMap::new();
    tables.insert(
        "users".to_string(),
        RawTableConfig {
            allowed_fields: vec![
                RawField { name: "name".to_string(), field_type: query_doc_sql::FieldType::String, nullable: false, default: None, foreign_key: None },
                RawField { name: "metadata".to_string(), field_type: query_doc_sql::FieldType::Object, nullable: true, default: None, foreign_key: None },
            ],
        },
    );
    let cfg = normalize_config(RawConfig { tables, variables: BTreeMap::new(), relationships: None, dialect: Dialect::Postgresql, data_table: None }).unwrap();

    let err = query_doc_sql::field_path::resolve_field_path("users.name->foo", "users", &cfg).unwrap_err();
    assert!(matches!(err, query_doc_sql::CompileError::JsonAccessTypeError { .. }));

    let err = query_doc_sql::field_path::resolve_field_path("users.123field", "users", &cfg).unwrap_err();
    assert!(matches!(err, query_doc_sql::CompileError::InvalidConfig(_)));

    let err = query_doc_sql::field_path::resolve_field_path("users.metadata->''", "users", &cfg).unwrap_err();
    assert!(matches!(err, query_doc_sql::CompileError::InvalidJsonAccessFormat(_)));
}
