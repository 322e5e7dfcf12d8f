// src/io/xml_schema.rs

//! On-demand XSD generation for population documents.

use std::collections::BTreeSet;

use crate::model::Model;

/// Generate the schema describing this model's population documents.
///
/// Variable types map `int -> xs:integer`, `double -> xs:double` and
/// everything else to `xs:string`. Variables sharing a name across agents
/// appear once, typed after their first declaration.
pub fn generate_schema(model: &Model) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\">\n");
    out.push_str("  <xs:element name=\"states\">\n");
    out.push_str("    <xs:complexType>\n");
    out.push_str("      <xs:sequence>\n");
    out.push_str(
        "        <xs:element name=\"itno\" type=\"xs:nonNegativeInteger\"/>\n",
    );
    out.push_str(
        "        <xs:element name=\"xagent\" minOccurs=\"0\" maxOccurs=\"unbounded\">\n",
    );
    out.push_str("          <xs:complexType>\n");
    out.push_str("            <xs:sequence>\n");
    out.push_str(
        "              <xs:element name=\"name\" type=\"xs:string\"/>\n",
    );

    let mut seen = BTreeSet::new();
    for agent in model.agents() {
        for var in &agent.variables {
            if !seen.insert(var.name.clone()) {
                continue;
            }
            out.push_str(&format!(
                "              <xs:element name=\"{}\" type=\"{}\" minOccurs=\"0\"/>\n",
                var.name,
                var.ty.xsd_type()
            ));
        }
    }

    out.push_str("            </xs:sequence>\n");
    out.push_str("          </xs:complexType>\n");
    out.push_str("        </xs:element>\n");
    out.push_str("      </xs:sequence>\n");
    out.push_str("    </xs:complexType>\n");
    out.push_str("  </xs:element>\n");
    out.push_str("</xs:schema>\n");
    out
}
