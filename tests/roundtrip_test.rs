use backfill::grid::{extract_workbook, render_workbook, Cell, CellValue, Row, Sheet, Workbook};
use backfill::renderer::empty_tree;
use backfill::{extract, render};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn text_roundtrip(template: &str, data: &Value) -> Value {
    let document = render(template, data).unwrap();
    extract(template, &document).unwrap()
}

#[test_log::test]
fn test_text_roundtrip() {
    let template = "Dear {{customer.name}},\n\
                    Your order {{order.id}} contains:\n\
                    {[order.lines|line]}* {{line.qty}} x {{line.product}};\n{[line]}\
                    Paid: {{order.paid}}\n";
    let data = json!({
        "customer": {"name": "Barry Smith"},
        "order": {
            "id": 1042,
            "lines": [
                {"qty": 2, "product": "green tea"},
                {"qty": 1, "product": "teapot"}
            ],
            "paid": true
        }
    });
    assert_eq!(text_roundtrip(template, &data), data);
}

#[test]
fn test_text_roundtrip_with_nested_loops() {
    let template = "{[groups|g]}[{{g.name}}:{[g.members|m]} {{m}},{[m]}]\n{[g]}done";
    let data = json!({
        "groups": [
            {"name": "admins", "members": ["ann", "bob"]},
            {"name": "guests", "members": []},
            {"name": "users", "members": ["cyd"]}
        ]
    });
    assert_eq!(text_roundtrip(template, &data), data);
}

fn text(column: usize, s: &str) -> Cell {
    Cell::new(column, CellValue::Text(s.to_string()))
}

#[test_log::test]
fn test_grid_roundtrip() {
    let template = Workbook {
        sheets: vec![Sheet {
            name: "Report {{period}}".to_string(),
            rows: vec![
                Row::new(0, vec![text(0, "Owner"), text(1, "{{owner}}")]),
                Row::new(
                    2,
                    vec![
                        text(0, "{{row.label}}")
                            .with_comment("{[rows|row]}")
                            .with_style("label"),
                        text(1, "{{row.amount}}").with_comment("{[row]}"),
                    ],
                ),
                Row::new(3, vec![text(0, "End of report")]),
            ],
        }],
    };
    let data = json!({
        "period": "Q3",
        "owner": "Barry",
        "rows": [
            {"label": "rent", "amount": 1200},
            {"label": "food", "amount": 350.5},
            {"label": "fun", "amount": 0}
        ]
    });

    let document = render_workbook(&template, &data).unwrap();
    let sheet = &document.sheets[0];
    assert_eq!(sheet.name, "Report Q3");
    assert_eq!(
        sheet.cell(4, 0).map(|c| &c.value),
        Some(&CellValue::Text("fun".to_string()))
    );
    assert_eq!(sheet.cell(3, 0).and_then(|c| c.style.as_deref()), Some("label"));

    let mut extracted = empty_tree();
    extract_workbook(&template, &document, &mut extracted).unwrap();
    assert_eq!(extracted, data);
}
