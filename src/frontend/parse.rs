use crate::ast::*;
use crate::semantic::Type;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, anychar, char, digit1, none_of, satisfy},
    combinator::{cut, map, not, opt, peek, recognize, value},
    error::{context, ContextError, ErrorKind, ParseError},
    multi::{many0, many0_count, many1, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

const KEYWORDS: &[&str] = &[
    "program", "var", "main", "end", "if", "else", "while", "do", "print", "return", "void",
    "int", "float", "bool", "string",
];

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn whitespace<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    take_while(|c: char| c.is_whitespace())(input)
}

/// A punctuation token, after optional whitespace.
fn symbol<'a, E: ParseError<&'a str>>(
    s: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str, E> {
    preceded(whitespace, tag(s))
}

/// A keyword that is not the prefix of a longer identifier.
fn keyword<'a, E: ParseError<&'a str>>(
    kw: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str, E> {
    preceded(whitespace, terminated(tag(kw), not(satisfy(is_symbol_char))))
}

fn parse_identifier<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, String, E> {
    let (input, _) = whitespace(input)?;
    let (rest, result) = recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)?;
    if KEYWORDS.contains(&result) {
        return Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Tag)));
    }
    Ok((rest, result.to_string()))
}

fn parse_type<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Type, E> {
    context(
        "type",
        alt((
            value(Type::Int, keyword("int")),
            value(Type::Float, keyword("float")),
            value(Type::Bool, keyword("bool")),
            value(Type::String, keyword("string")),
        )),
    )(input)
}

fn parse_return_type<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Type, E> {
    alt((value(Type::Void, keyword("void")), parse_type))(input)
}

///////////////////////////////////////////////////////////////////////////////
// Declarations

pub fn parse_program<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Program, E> {
    // "program" ID ";" vars* funcs* "main" block "end"
    let (input, _) = context("program header", keyword("program"))(input)?;
    let (input, name) = cut(parse_identifier)(input)?;
    let (input, _) = cut(symbol(";"))(input)?;
    let (input, globals) = many0(parse_vars)(input)?;
    let (input, functions) = many0(context("function", parse_function))(input)?;
    let (input, _) = context("main", keyword("main"))(input)?;
    let (input, body) = cut(parse_block)(input)?;
    let (input, _) = context("end", keyword("end"))(input)?;
    let (input, _) = whitespace(input)?;

    Ok((
        input,
        Program::new(name)
            .with_globals(globals.into_iter().flatten().collect())
            .with_functions(functions)
            .with_body(body),
    ))
}

fn parse_vars<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Vec<VarGroup>, E> {
    // "var" (ID ("," ID)* ":" type ";")+
    let (input, _) = keyword("var")(input)?;
    cut(many1(context("variable declaration", parse_var_group)))(input)
}

fn parse_var_group<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, VarGroup, E> {
    let (input, names) = separated_list1(symbol(","), parse_identifier)(input)?;
    let (input, _) = symbol(":")(input)?;
    let (input, ty) = parse_type(input)?;
    let (input, _) = symbol(";")(input)?;
    Ok((input, VarGroup { names, ty }))
}

fn parse_function<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Function, E> {
    let (input, return_type) = parse_return_type(input)?;
    let (input, name) = cut(parse_identifier)(input)?;
    let (input, params) = cut(delimited(
        symbol("("),
        separated_list0(symbol(","), parse_param),
        symbol(")"),
    ))(input)?;

    let (input, _) = cut(symbol("{"))(input)?;
    let (input, locals) = many0(parse_vars)(input)?;
    let (input, body) = many0(parse_statement)(input)?;
    let (input, _) = cut(context("end of function body", symbol("}")))(input)?;
    let (input, _) = opt(symbol(";"))(input)?;

    Ok((
        input,
        Function::new(name, return_type, params)
            .with_locals(locals.into_iter().flatten().collect())
            .with_body(body),
    ))
}

fn parse_param<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Param, E> {
    let (input, name) = parse_identifier(input)?;
    let (input, _) = symbol(":")(input)?;
    let (input, ty) = cut(parse_type)(input)?;
    Ok((input, Param { name, ty }))
}

///////////////////////////////////////////////////////////////////////////////
// Statements

fn parse_block<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Vec<Statement>, E> {
    let (input, _) = symbol("{")(input)?;
    let (input, body) = many0(parse_statement)(input)?;
    let (input, _) = cut(context("end of block", symbol("}")))(input)?;
    Ok((input, body))
}

fn parse_statement<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Statement, E> {
    context(
        "statement",
        alt((
            parse_if_stmt,
            parse_while_stmt,
            parse_print_stmt,
            parse_return_stmt,
            map(parse_block, Statement::Block),
            parse_assign_stmt,
            map(terminated(parse_call, symbol(";")), Statement::Call),
        )),
    )(input)
}

fn parse_if_stmt<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Statement, E> {
    let (input, _) = keyword("if")(input)?;
    let (input, cond) = cut(delimited(symbol("("), parse_expr, symbol(")")))(input)?;
    let (input, then) = cut(parse_block)(input)?;
    let (input, otherwise) = opt(preceded(keyword("else"), cut(parse_block)))(input)?;
    let (input, _) = opt(symbol(";"))(input)?;
    Ok((
        input,
        Statement::If {
            cond,
            then,
            otherwise,
        },
    ))
}

fn parse_while_stmt<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Statement, E> {
    let (input, _) = keyword("while")(input)?;
    let (input, cond) = cut(delimited(symbol("("), parse_expr, symbol(")")))(input)?;
    let (input, _) = opt(keyword("do"))(input)?;
    let (input, body) = cut(parse_block)(input)?;
    let (input, _) = opt(symbol(";"))(input)?;
    Ok((input, Statement::While { cond, body }))
}

fn parse_print_stmt<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Statement, E> {
    let (input, _) = keyword("print")(input)?;
    let (input, args) = cut(delimited(
        symbol("("),
        separated_list1(symbol(","), parse_print_arg),
        symbol(")"),
    ))(input)?;
    let (input, _) = cut(symbol(";"))(input)?;
    Ok((input, Statement::Print(args)))
}

fn parse_print_arg<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, PrintArg, E> {
    alt((
        // A lone string literal; a string inside a larger expression falls
        // through to the expression parser.
        map(
            terminated(
                parse_string_literal,
                peek(alt((symbol(","), symbol(")")))),
            ),
            PrintArg::Str,
        ),
        map(parse_expr, PrintArg::Expr),
    ))(input)
}

fn parse_return_stmt<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Statement, E> {
    let (input, _) = keyword("return")(input)?;
    let (input, value) = opt(parse_expr)(input)?;
    let (input, _) = cut(symbol(";"))(input)?;
    Ok((input, Statement::Return(value)))
}

fn parse_assign_stmt<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Statement, E> {
    let (input, target) = parse_identifier(input)?;
    let (input, _) = terminated(symbol("="), not(char('=')))(input)?;
    let (input, value) = cut(parse_expr)(input)?;
    let (input, _) = cut(symbol(";"))(input)?;
    Ok((input, Statement::Assign { target, value }))
}

fn parse_call<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Call, E> {
    let (input, name) = parse_identifier(input)?;
    let (input, _) = symbol("(")(input)?;
    let (input, args) = separated_list0(symbol(","), parse_expr)(input)?;
    let (input, _) = cut(symbol(")"))(input)?;
    Ok((input, Call { name, args }))
}

///////////////////////////////////////////////////////////////////////////////
// Expressions

pub fn parse_expr<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Expr, E> {
    let (input, lhs) = parse_exp(input)?;
    let (input, rel) = opt(pair(parse_relop, cut(parse_exp)))(input)?;
    Ok((input, Expr { lhs, rel }))
}

fn parse_relop<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, BinaryOp, E> {
    alt((
        value(BinaryOp::Ge, symbol(">=")),
        value(BinaryOp::Le, symbol("<=")),
        value(BinaryOp::Eq, symbol("==")),
        value(BinaryOp::Ne, symbol("!=")),
        value(BinaryOp::Gt, symbol(">")),
        value(BinaryOp::Lt, symbol("<")),
    ))(input)
}

fn parse_exp<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Exp, E> {
    let (input, head) = parse_term(input)?;
    let (input, tail) = many0(pair(
        alt((
            value(BinaryOp::Add, symbol("+")),
            value(BinaryOp::Sub, symbol("-")),
        )),
        cut(parse_term),
    ))(input)?;
    Ok((input, Exp { head, tail }))
}

fn parse_term<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Term, E> {
    let (input, head) = parse_factor(input)?;
    let (input, tail) = many0(pair(
        alt((
            value(BinaryOp::Mul, symbol("*")),
            value(BinaryOp::Div, symbol("/")),
        )),
        cut(parse_factor),
    ))(input)?;
    Ok((input, Term { head, tail }))
}

fn parse_factor<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Factor, E> {
    context(
        "expression",
        alt((
            map(
                delimited(symbol("("), cut(parse_expr), cut(symbol(")"))),
                |expr| Factor::Group(Box::new(expr)),
            ),
            map(
                pair(
                    alt((
                        value(UnaryOp::Plus, symbol("+")),
                        value(UnaryOp::Neg, symbol("-")),
                    )),
                    cut(parse_factor),
                ),
                |(op, factor)| Factor::Unary(op, Box::new(factor)),
            ),
            map(parse_call, Factor::Call),
            map(parse_float_literal, Factor::Float),
            map(parse_int_literal, Factor::Int),
            map(parse_string_literal, Factor::Str),
            map(parse_identifier, Factor::Var),
        )),
    )(input)
}

fn parse_int_literal<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, i64, E> {
    let (input, _) = whitespace(input)?;
    let (rest, digits) = terminated(digit1, not(satisfy(is_symbol_char)))(input)?;
    match digits.parse() {
        Ok(n) => Ok((rest, n)),
        Err(_) => Err(nom::Err::Failure(E::add_context(
            input,
            "integer literal out of range",
            E::from_error_kind(input, ErrorKind::Digit),
        ))),
    }
}

fn parse_float_literal<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, f64, E> {
    let (input, _) = whitespace(input)?;
    let (rest, text) = terminated(
        recognize(tuple((digit1, char('.'), digit1))),
        not(satisfy(is_symbol_char)),
    )(input)?;
    match text.parse() {
        Ok(n) => Ok((rest, n)),
        Err(_) => Err(nom::Err::Failure(E::from_error_kind(input, ErrorKind::Float))),
    }
}

fn parse_string_literal<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, String, E> {
    let (input, _) = whitespace(input)?;
    let (rest, raw) = context(
        "string",
        recognize(tuple((
            char('"'),
            many0_count(alt((
                recognize(pair(char('\\'), anychar)),
                recognize(none_of("\\\"")),
            ))),
            cut(char('"')),
        ))),
    )(input)?;

    match snailquote::unescape(raw) {
        Ok(text) => Ok((rest, text)),
        Err(_) => Err(nom::Err::Failure(E::add_context(
            input,
            "invalid escape sequence",
            E::from_error_kind(input, ErrorKind::Escaped),
        ))),
    }
}
