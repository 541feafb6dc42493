//! Resolution of attribute syntaxes from the server's subschema.
//!
//! The directory publishes its attribute types as RFC 4512
//! `AttributeTypeDescription` strings in the `attributeTypes` attribute of the
//! subschema entry. Each description may omit its syntax and instead name a
//! superior type (`SUP`) to inherit it from. [`SchemaDescription`] flattens
//! those chains into a lookup from attribute name to syntax, which the
//! [value codec](crate::value) uses to decide how to interpret raw values.

use std::{collections::HashMap, str::FromStr};

use crate::{
	error::{Error, Result},
	value::SyntaxKind,
};

/// Syntax OIDs from RFC 4517 that this crate knows how to interpret.
pub mod syntax {
	/// Boolean
	pub const BOOLEAN: &str = "1.3.6.1.4.1.1466.115.121.1.7";
	/// Distinguished Name
	pub const DN: &str = "1.3.6.1.4.1.1466.115.121.1.12";
	/// Directory String
	pub const DIRECTORY_STRING: &str = "1.3.6.1.4.1.1466.115.121.1.15";
	/// IA5 String
	pub const IA5_STRING: &str = "1.3.6.1.4.1.1466.115.121.1.26";
	/// Integer
	pub const INTEGER: &str = "1.3.6.1.4.1.1466.115.121.1.27";
	/// Numeric String
	pub const NUMERIC_STRING: &str = "1.3.6.1.4.1.1466.115.121.1.36";
	/// OID, also used for object class names
	pub const OID: &str = "1.3.6.1.4.1.1466.115.121.1.38";
	/// Octet String
	pub const OCTET_STRING: &str = "1.3.6.1.4.1.1466.115.121.1.40";
	/// Printable String
	pub const PRINTABLE_STRING: &str = "1.3.6.1.4.1.1466.115.121.1.44";
	/// Telephone Number
	pub const TELEPHONE_NUMBER: &str = "1.3.6.1.4.1.1466.115.121.1.50";
}

/// The reverse-membership attribute many servers compute on the fly without
/// listing it in their schema.
pub const MEMBER_OF: &str = "memberOf";

/// The resolved syntax of one attribute type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSyntax {
	/// The name the attribute was registered under.
	pub name: String,
	/// The syntax OID, inherited from a superior type if necessary.
	pub syntax: String,
	/// Whether the attribute may hold at most one value.
	pub single_valued: bool,
}

impl AttributeSyntax {
	/// The codec classification of this syntax.
	#[must_use]
	pub fn kind(&self) -> SyntaxKind {
		SyntaxKind::from_oid(&self.syntax)
	}
}

/// Lookup from attribute name to its resolved syntax.
///
/// Names are matched case-insensitively, and every alias of a definition, as
/// well as its numeric OID, resolves to the same entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescription {
	/// Resolved syntaxes keyed by lower-cased name.
	attributes: HashMap<String, AttributeSyntax>,
}

impl SchemaDescription {
	/// Parse and resolve the raw `attributeTypes` values of a subschema entry.
	pub fn from_dump<S: AsRef<str>>(dump: &[S]) -> Result<Self> {
		let definitions = dump
			.iter()
			.map(|description| description.as_ref().parse())
			.collect::<Result<Vec<AttributeTypeDefinition>>>()?;
		Self::resolve(&definitions)
	}

	/// Build the lookup from parsed attribute type definitions, following
	/// `SUP` chains for definitions that do not declare a syntax.
	pub fn resolve(definitions: &[AttributeTypeDefinition]) -> Result<Self> {
		let mut index: HashMap<String, &AttributeTypeDefinition> = HashMap::new();
		for definition in definitions {
			index.insert(definition.oid.to_lowercase(), definition);
			for name in &definition.names {
				index.insert(name.to_lowercase(), definition);
			}
		}

		let mut schema = SchemaDescription::default();
		for definition in definitions {
			let syntax = inherited_syntax(definition, &index, definitions.len())?;
			let canonical = definition.names.first().unwrap_or(&definition.oid);
			for name in definition.names.iter().chain(std::iter::once(&definition.oid)) {
				schema.attributes.insert(
					name.to_lowercase(),
					AttributeSyntax {
						name: canonical.clone(),
						syntax: syntax.to_owned(),
						single_valued: definition.single_valued,
					},
				);
			}
		}

		schema.insert(MEMBER_OF, syntax::DN, false);
		Ok(schema)
	}

	/// Register (or replace) the syntax of an attribute.
	pub fn insert(&mut self, name: &str, syntax: &str, single_valued: bool) {
		self.attributes.insert(
			name.to_lowercase(),
			AttributeSyntax { name: name.to_owned(), syntax: syntax.to_owned(), single_valued },
		);
	}

	/// Look up the syntax of an attribute.
	#[must_use]
	pub fn get(&self, name: &str) -> Option<&AttributeSyntax> {
		self.attributes.get(&name.to_lowercase())
	}

	/// The codec classification of an attribute. Attributes missing from the
	/// schema are treated as opaque.
	#[must_use]
	pub fn kind(&self, name: &str) -> SyntaxKind {
		self.get(name).map_or(SyntaxKind::Opaque, AttributeSyntax::kind)
	}

	/// Number of registered names, aliases included.
	#[must_use]
	pub fn len(&self) -> usize {
		self.attributes.len()
	}

	/// Whether nothing is registered.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.attributes.is_empty()
	}
}

/// Walk the superior chain of a definition until a syntax is found. The
/// chain may be no longer than the number of definitions, anything longer
/// must contain a cycle.
fn inherited_syntax<'a>(
	definition: &'a AttributeTypeDefinition,
	index: &HashMap<String, &'a AttributeTypeDefinition>,
	limit: usize,
) -> Result<&'a str> {
	let mut current = definition;
	for _ in 0..=limit {
		if let Some(syntax) = &current.syntax {
			return Ok(syntax.as_str());
		}
		let Some(sup) = &current.sup else {
			return Err(Error::schema(
				definition.name(),
				format!("{} declares neither SYNTAX nor SUP", current.name()),
			));
		};
		current = index.get(&sup.to_lowercase()).copied().ok_or_else(|| {
			Error::schema(definition.name(), format!("superior type {sup} does not exist"))
		})?;
	}
	Err(Error::schema(definition.name(), "superior chain contains a cycle"))
}

/// One parsed RFC 4512 `AttributeTypeDescription`, reduced to the parts the
/// codec needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeTypeDefinition {
	/// Numeric OID of the type.
	pub oid: String,
	/// Names of the type, the first one being canonical.
	pub names: Vec<String>,
	/// Syntax OID without length bound, if declared.
	pub syntax: Option<String>,
	/// Whether `SINGLE-VALUE` was declared.
	pub single_valued: bool,
	/// Name or OID of the superior type, if any.
	pub sup: Option<String>,
}

impl AttributeTypeDefinition {
	/// The canonical name, falling back to the OID.
	#[must_use]
	pub fn name(&self) -> &str {
		self.names.first().unwrap_or(&self.oid)
	}
}

impl FromStr for AttributeTypeDefinition {
	type Err = Error;

	fn from_str(description: &str) -> Result<Self> {
		let malformed = |reason: &str| Error::schema(description, reason.to_owned());
		let tokens = tokenize(description).ok_or_else(|| malformed("unterminated quote"))?;
		let mut tokens = tokens.into_iter();

		if tokens.next() != Some(Token::Open) {
			return Err(malformed("expected opening parenthesis"));
		}
		let Some(Token::Word(oid)) = tokens.next() else {
			return Err(malformed("expected numeric OID"));
		};
		let mut definition = AttributeTypeDefinition { oid, ..Self::default() };

		loop {
			match tokens.next() {
				Some(Token::Close) => break,
				Some(Token::Word(keyword)) => match keyword.as_str() {
					"NAME" => {
						definition.names =
							qdescrs(&mut tokens).ok_or_else(|| malformed("bad NAME"))?;
					}
					"SUP" => match tokens.next() {
						Some(Token::Word(sup)) => definition.sup = Some(sup),
						_ => return Err(malformed("bad SUP")),
					},
					"SYNTAX" => match tokens.next() {
						Some(Token::Word(noidlen) | Token::Quoted(noidlen)) => {
							let oid = noidlen.split('{').next().unwrap_or_default();
							definition.syntax = Some(oid.to_owned());
						}
						_ => return Err(malformed("bad SYNTAX")),
					},
					"SINGLE-VALUE" => definition.single_valued = true,
					"OBSOLETE" | "COLLECTIVE" | "NO-USER-MODIFICATION" => {}
					_ => skip_value(&mut tokens).ok_or_else(|| malformed("truncated description"))?,
				},
				_ => return Err(malformed("unexpected token")),
			}
		}
		Ok(definition)
	}
}

/// Lexical element of a schema description.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
	/// `(`
	Open,
	/// `)`
	Close,
	/// A bare keyword, OID or descriptor.
	Word(String),
	/// A single-quoted string, without the quotes.
	Quoted(String),
}

/// Split a description into tokens. Returns `None` on an unterminated quote.
fn tokenize(input: &str) -> Option<Vec<Token>> {
	let mut tokens = Vec::new();
	let mut chars = input.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			'(' => tokens.push(Token::Open),
			')' => tokens.push(Token::Close),
			'\'' => {
				let mut quoted = String::new();
				loop {
					match chars.next()? {
						'\'' => break,
						c => quoted.push(c),
					}
				}
				tokens.push(Token::Quoted(quoted));
			}
			c if c.is_whitespace() => {}
			c => {
				let mut word = String::from(c);
				while let Some(&next) = chars.peek() {
					if next.is_whitespace() || matches!(next, '(' | ')' | '\'') {
						break;
					}
					word.push(next);
					chars.next();
				}
				tokens.push(Token::Word(word));
			}
		}
	}
	Some(tokens)
}

/// Read `'name'` or `( 'name1' 'name2' ... )`.
fn qdescrs(tokens: &mut impl Iterator<Item = Token>) -> Option<Vec<String>> {
	match tokens.next()? {
		Token::Quoted(name) => Some(vec![name]),
		Token::Open => {
			let mut names = Vec::new();
			loop {
				match tokens.next()? {
					Token::Quoted(name) => names.push(name),
					Token::Close => return Some(names),
					_ => return None,
				}
			}
		}
		_ => None,
	}
}

/// Skip the value of a keyword we do not interpret.
fn skip_value(tokens: &mut impl Iterator<Item = Token>) -> Option<()> {
	if tokens.next()? == Token::Open {
		while tokens.next()? != Token::Close {}
	}
	Some(())
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use super::{syntax, AttributeTypeDefinition, SchemaDescription};
	use crate::{error::Error, value::SyntaxKind};

	#[test]
	fn parse_description() -> Result<(), Box<dyn std::error::Error>> {
		let cn: AttributeTypeDefinition =
			"( 2.5.4.3 NAME ( 'cn' 'commonName' ) DESC 'RFC4519: common name(s)' SUP name )"
				.parse()?;
		assert_eq!(cn.oid, "2.5.4.3");
		assert_eq!(cn.names, ["cn", "commonName"]);
		assert_eq!(cn.sup.as_deref(), Some("name"));
		assert_eq!(cn.syntax, None);
		assert!(!cn.single_valued);

		let uid_number: AttributeTypeDefinition = "( 1.3.6.1.1.1.1.0 NAME 'uidNumber' \
			EQUALITY integerMatch ORDERING integerOrderingMatch \
			SYNTAX 1.3.6.1.4.1.1466.115.121.1.27 SINGLE-VALUE X-ORIGIN ( 'RFC 2307' 'draft' ) )"
			.parse()?;
		assert_eq!(uid_number.names, ["uidNumber"]);
		assert_eq!(uid_number.syntax.as_deref(), Some(syntax::INTEGER));
		assert!(uid_number.single_valued);

		let name: AttributeTypeDefinition =
			"( 2.5.4.41 NAME 'name' SYNTAX 1.3.6.1.4.1.1466.115.121.1.15{32768} )".parse()?;
		assert_eq!(name.syntax.as_deref(), Some(syntax::DIRECTORY_STRING));

		Ok(())
	}

	#[test]
	fn reject_malformed() {
		for description in ["2.5.4.3 NAME 'cn'", "( 2.5.4.3 NAME 'cn", "( 2.5.4.3 NAME 'cn' SUP"] {
			assert!(
				matches!(
					description.parse::<AttributeTypeDefinition>(),
					Err(Error::SchemaResolution { .. })
				),
				"{description} should not parse"
			);
		}
	}

	#[test]
	fn inherit_through_chain() -> Result<(), Box<dyn std::error::Error>> {
		let schema = SchemaDescription::from_dump(&[
			"( 2.5.4.41 NAME 'name' SYNTAX 1.3.6.1.4.1.1466.115.121.1.15 )",
			"( 2.5.4.3 NAME ( 'cn' 'commonName' ) SUP name )",
			"( 9.9.9.1 NAME 'nickName' SUP commonName SINGLE-VALUE )",
		])?;

		for name in ["name", "cn", "commonName", "CN", "nickName", "2.5.4.3"] {
			let resolved = schema.get(name).unwrap();
			assert_eq!(resolved.syntax, syntax::DIRECTORY_STRING, "{name}");
			assert_eq!(resolved.kind(), SyntaxKind::Text);
		}
		assert_eq!(schema.get("commonName").unwrap().name, "cn");
		assert!(schema.get("nickName").unwrap().single_valued);
		assert!(!schema.get("cn").unwrap().single_valued);

		Ok(())
	}

	#[test]
	fn superior_given_by_oid() -> Result<(), Box<dyn std::error::Error>> {
		let schema = SchemaDescription::from_dump(&[
			"( 1.1.1 NAME 'flag' SYNTAX 1.3.6.1.4.1.1466.115.121.1.7 SINGLE-VALUE )",
			"( 1.1.2 NAME 'otherFlag' SUP 1.1.1 )",
		])?;
		assert_eq!(schema.kind("otherFlag"), SyntaxKind::Boolean);
		Ok(())
	}

	#[test]
	fn self_reference_is_fatal() {
		let result = SchemaDescription::from_dump(&["( 1.1.1 NAME 'loop' SUP loop )"]);
		assert!(matches!(result, Err(Error::SchemaResolution { attribute, .. }) if attribute == "loop"));

		let result = SchemaDescription::from_dump(&[
			"( 1.1.1 NAME 'a' SUP b )",
			"( 1.1.2 NAME 'b' SUP a )",
		]);
		assert!(matches!(result, Err(Error::SchemaResolution { .. })));
	}

	#[test]
	fn missing_superior_is_fatal() {
		let result = SchemaDescription::from_dump(&["( 1.1.1 NAME 'orphan' SUP nowhere )"]);
		assert!(
			matches!(result, Err(Error::SchemaResolution { reason, .. }) if reason.contains("nowhere"))
		);
	}

	#[test]
	fn member_of_is_always_present() -> Result<(), Box<dyn std::error::Error>> {
		let empty: [&str; 0] = [];
		let schema = SchemaDescription::from_dump(&empty)?;
		let member_of = schema.get("memberof").unwrap();
		assert_eq!(member_of.syntax, syntax::DN);
		assert!(!member_of.single_valued);

		// A server-provided definition does not win over the injected one.
		let schema = SchemaDescription::from_dump(&[
			"( 1.2.3 NAME 'memberOf' SYNTAX 1.3.6.1.4.1.1466.115.121.1.40 SINGLE-VALUE )",
		])?;
		assert_eq!(schema.kind("memberOf"), SyntaxKind::Text);
		Ok(())
	}

	#[test]
	fn unknown_attributes_are_opaque() {
		assert_eq!(SchemaDescription::default().kind("userPassword"), SyntaxKind::Opaque);
	}
}
