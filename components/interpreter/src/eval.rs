//! Statement and expression evaluation.
//!
//! Bindings live in environment objects (`ObjectClass::Environment`) chained
//! through their `outer` link. A chain may end in an ordinary object, which
//! then acts as an object environment (the global object, or the scope object
//! of `evaluate_in_scope`); lookups that miss it fall back to the global
//! object.

use crate::completion::{Abrupt, Completion, EvalResult};
use crate::hooks::ResolveFlags;
use crate::operations::{to_int32, to_uint32, PreferredType};
use crate::runtime::Runtime;
use core_types::{ErrorKind, ObjectId, Value};
use memory_manager::{Callable, ObjectClass, ObjectData, PropertyFlags};
use parser::ast::{
    BinaryOperator, ForInLeft, ForInit, FunctionNode, Literal, LogicalOperator,
    ObjectProperty, PropertyKind, UnaryOperator, UpdateOperator, VariableDeclarator, VariableKind,
};
use parser::{Expression, Statement};
use std::rc::Rc;

/// Execution context of a statement.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope {
    /// Innermost lexical environment
    pub(crate) env: ObjectId,
    /// Where `var` and function declarations go
    pub(crate) var_env: ObjectId,
    /// `this`
    pub(crate) this: Value,
}

/// Target of an assignment or call.
enum Reference {
    /// Binding held by an environment or object environment
    Binding { holder: ObjectId, name: String },
    /// `base[key]`
    Property { base: Value, key: String },
    /// Name not found anywhere
    Unresolved(String),
}

fn collect_var_names(body: &[Statement], names: &mut Vec<String>) {
    for statement in body {
        collect_var_names_in(statement, names);
    }
}

fn collect_var_names_in(statement: &Statement, names: &mut Vec<String>) {
    match statement {
        Statement::VariableDeclaration {
            kind: VariableKind::Var,
            declarations,
            ..
        } => names.extend(declarations.iter().map(|d| d.name.clone())),
        Statement::IfStatement {
            consequent,
            alternate,
            ..
        } => {
            collect_var_names_in(consequent, names);
            if let Some(alternate) = alternate {
                collect_var_names_in(alternate, names);
            }
        }
        Statement::WhileStatement { body, .. } | Statement::DoWhileStatement { body, .. } => {
            collect_var_names_in(body, names)
        }
        Statement::ForStatement { init, body, .. } => {
            if let Some(ForInit::VariableDeclaration {
                kind: VariableKind::Var,
                declarations,
            }) = init
            {
                names.extend(declarations.iter().map(|d| d.name.clone()));
            }
            collect_var_names_in(body, names);
        }
        Statement::ForInStatement { left, body, .. } => {
            if let ForInLeft::Declaration {
                kind: VariableKind::Var,
                name,
            } = left
            {
                names.push(name.clone());
            }
            collect_var_names_in(body, names);
        }
        Statement::BlockStatement { body, .. } => collect_var_names(body, names),
        Statement::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => {
            collect_var_names(block, names);
            if let Some(handler) = handler {
                collect_var_names(&handler.body, names);
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, names);
            }
        }
        _ => {}
    }
}

fn has_lexical_declarations(body: &[Statement]) -> bool {
    body.iter().any(|s| {
        matches!(
            s,
            Statement::VariableDeclaration {
                kind: VariableKind::Let | VariableKind::Const,
                ..
            }
        )
    })
}

/// Short source-like description of an expression for error messages.
fn describe(expression: &Expression) -> String {
    match expression {
        Expression::Identifier(name) => name.clone(),
        Expression::ThisExpression => "this".to_string(),
        Expression::MemberExpression {
            object,
            property,
            computed: false,
        } => match property.as_ref() {
            Expression::Literal(Literal::String(name)) => format!("{}.{}", describe(object), name),
            _ => describe(object),
        },
        Expression::MemberExpression { object, .. } => format!("{}[...]", describe(object)),
        Expression::CallExpression { callee, .. } => format!("{}(...)", describe(callee)),
        Expression::Literal(Literal::Null) => "null".to_string(),
        Expression::Literal(Literal::String(s)) => format!("{:?}", s),
        Expression::Literal(Literal::Number(n)) => crate::operations::number_to_string(*n),
        Expression::Literal(Literal::Boolean(b)) => b.to_string(),
        _ => "expression".to_string(),
    }
}

impl Runtime {
    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// Hoist `var` names, function declarations and block-level `let`/`const`.
    pub(crate) fn instantiate(&self, body: &[Statement], scope: Scope) -> EvalResult<()> {
        let mut names = Vec::new();
        collect_var_names(body, &mut names);
        for name in names {
            if !self.has_own_property(scope.var_env, &name)? {
                self.define_property(scope.var_env, &name, Value::Undefined, PropertyFlags::PERMANENT)?;
            }
        }
        self.instantiate_block(body, scope)
    }

    fn instantiate_block(&self, body: &[Statement], scope: Scope) -> EvalResult<()> {
        for statement in body {
            match statement {
                Statement::FunctionDeclaration { function, .. } => {
                    let closure = self.make_function(function, scope.env)?;
                    self.define_property(
                        scope.var_env,
                        function.name.as_deref().unwrap_or_default(),
                        Value::Object(closure),
                        PropertyFlags::PERMANENT,
                    )?;
                }
                Statement::VariableDeclaration {
                    kind: VariableKind::Let | VariableKind::Const,
                    declarations,
                    ..
                } => {
                    for declaration in declarations {
                        self.define_own(scope.env, &declaration.name, Value::Undefined, PropertyFlags::PERMANENT)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn new_environment(&self, outer: ObjectId) -> ObjectId {
        self.alloc_object(ObjectData::new(
            ObjectClass::Environment { outer: Some(outer) },
            None,
        ))
    }

    /// Create a closure for a function literal.
    pub(crate) fn make_function(&self, function: &Rc<FunctionNode>, scope: ObjectId) -> EvalResult<ObjectId> {
        let code = self.code_for(function);
        let closure = self.alloc_object(ObjectData::new(
            ObjectClass::Function(Callable::Script { code, scope }),
            Some(self.realm.function_prototype),
        ));
        let prototype = self.alloc_object(ObjectData::ordinary(Some(self.realm.object_prototype)));
        self.define_own(prototype, "constructor", Value::Object(closure), PropertyFlags::DONT_ENUMERATE)?;
        self.define_own(
            closure,
            "prototype",
            Value::Object(prototype),
            PropertyFlags::DONT_ENUMERATE | PropertyFlags::PERMANENT,
        )?;
        let fixed = PropertyFlags::DONT_ENUMERATE | PropertyFlags::READ_ONLY | PropertyFlags::PERMANENT;
        self.define_own(closure, "length", Value::from_f64(function.params.len() as f64), fixed)?;
        let name = self.alloc_string(function.name.as_deref().unwrap_or_default());
        self.define_own(closure, "name", name, fixed)?;
        Ok(closure)
    }

    fn make_function_expression(&self, function: &Rc<FunctionNode>, scope: Scope) -> EvalResult<ObjectId> {
        match &function.name {
            Some(name) => {
                let env = self.new_environment(scope.env);
                let closure = self.make_function(function, env)?;
                self.define_own(env, name, Value::Object(closure), PropertyFlags::READ_ONLY)?;
                Ok(closure)
            }
            None => self.make_function(function, scope.env),
        }
    }

    // ------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------

    fn resolve_binding(&self, scope: Scope, name: &str) -> EvalResult<Option<ObjectId>> {
        let global = self.realm.global;
        let mut current = Some(scope.env);
        let mut saw_global = false;
        while let Some(env) = current {
            let outer = match self.heap.borrow().object(env)?.class {
                ObjectClass::Environment { outer } => Some(outer),
                _ => None,
            };
            match outer {
                Some(outer) => {
                    if self.own_property(env, name)?.is_some() {
                        return Ok(Some(env));
                    }
                    current = outer;
                }
                None => {
                    if self.has_property(env, name, ResolveFlags::empty())? {
                        return Ok(Some(env));
                    }
                    saw_global = env == global;
                    current = None;
                }
            }
        }
        if !saw_global && self.has_property(global, name, ResolveFlags::empty())? {
            return Ok(Some(global));
        }
        Ok(None)
    }

    fn is_environment(&self, object: ObjectId) -> EvalResult<bool> {
        Ok(matches!(
            self.heap.borrow().object(object)?.class,
            ObjectClass::Environment { .. }
        ))
    }

    fn reference_to(&self, expression: &Expression, scope: Scope) -> EvalResult<Reference> {
        match expression {
            Expression::Identifier(name) => Ok(match self.resolve_binding(scope, name)? {
                Some(holder) => Reference::Binding {
                    holder,
                    name: name.clone(),
                },
                None => Reference::Unresolved(name.clone()),
            }),
            Expression::MemberExpression {
                object,
                property,
                computed,
            } => {
                let base = self.eval(object, scope)?;
                let key = self.member_key(property, *computed, scope)?;
                if base.is_void() {
                    let message = match object.as_ref() {
                        Expression::Literal(_) => format!("{} has no properties", describe(object)),
                        _ => {
                            let what = if base.is_null() { "null" } else { "undefined" };
                            format!("{} is {}", describe(object), what)
                        }
                    };
                    return self.throw(ErrorKind::TypeError, message);
                }
                Ok(Reference::Property { base, key })
            }
            _ => self.throw(ErrorKind::ReferenceError, "invalid assignment target"),
        }
    }

    fn member_key(&self, property: &Expression, computed: bool, scope: Scope) -> EvalResult<String> {
        match (computed, property) {
            (false, Expression::Literal(Literal::String(name))) => Ok(name.clone()),
            _ => {
                let key = self.eval(property, scope)?;
                self.to_property_key(key)
            }
        }
    }

    fn get_reference(&self, reference: &Reference) -> EvalResult {
        match reference {
            Reference::Binding { holder, name } => {
                if self.is_environment(*holder)? {
                    Ok(self
                        .own_property(*holder, name)?
                        .and_then(|p| p.value())
                        .unwrap_or(Value::Undefined))
                } else {
                    self.get_property(*holder, name, Value::Object(*holder))
                }
            }
            Reference::Property { base, key } => self.get_value_property(*base, key),
            Reference::Unresolved(name) => {
                self.throw(ErrorKind::ReferenceError, format!("{} is not defined", name))
            }
        }
    }

    fn put_reference(&self, reference: &Reference, value: Value) -> EvalResult<()> {
        match reference {
            Reference::Binding { holder, name } => {
                if self.is_environment(*holder)? {
                    let read_only = self
                        .own_property(*holder, name)?
                        .map(|p| p.flags.contains(PropertyFlags::READ_ONLY))
                        .unwrap_or(false);
                    if read_only {
                        return self.throw(ErrorKind::TypeError, format!("invalid assignment to const {}", name));
                    }
                    let mut heap = self.heap.borrow_mut();
                    let data = heap.object_mut(*holder)?;
                    let flags = data.get_own(name).map(|p| p.flags).unwrap_or_default();
                    data.define(name.as_str(), memory_manager::Property::data(value, flags));
                    Ok(())
                } else {
                    self.set_property(*holder, name, value, Value::Object(*holder))
                }
            }
            Reference::Property { base, key } => self.set_value_property(*base, key, value),
            Reference::Unresolved(name) => {
                let global = self.realm.global;
                self.set_property(global, name, value, Value::Object(global))
            }
        }
    }

    fn assign_name(&self, name: &str, value: Value, scope: Scope) -> EvalResult<()> {
        let reference = match self.resolve_binding(scope, name)? {
            Some(holder) => Reference::Binding {
                holder,
                name: name.to_string(),
            },
            None => Reference::Unresolved(name.to_string()),
        };
        self.put_reference(&reference, value)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Execute a statement list, returning the first abrupt completion or the
    /// value of the last expression statement.
    pub(crate) fn exec_statements(&self, body: &[Statement], scope: Scope) -> EvalResult<Completion> {
        let mut last = None;
        for statement in body {
            match self.exec_rooted(statement, scope)? {
                Completion::Normal(Some(value)) => last = Some(value),
                Completion::Normal(None) => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal(last))
    }

    /// Execute a statement, popping every temporary it rooted except its
    /// completion value.
    fn exec_rooted(&self, statement: &Statement, scope: Scope) -> EvalResult<Completion> {
        let mark = self.heap.borrow().local_root_mark();
        let result = self.exec_statement(statement, scope);
        self.heap.borrow_mut().truncate_local_roots(mark);
        match &result {
            Ok(completion) => {
                if let Some(value) = completion.value() {
                    self.temp(value);
                }
            }
            Err(Abrupt::Throw(value)) => {
                self.temp(*value);
            }
            Err(_) => {}
        }
        result
    }

    fn exec_block(&self, body: &[Statement], scope: Scope) -> EvalResult<Completion> {
        let scope = if has_lexical_declarations(body) {
            Scope {
                env: self.new_environment(scope.env),
                ..scope
            }
        } else {
            scope
        };
        self.instantiate_block(body, scope)?;
        self.exec_statements(body, scope)
    }

    fn test(&self, expression: &Expression, scope: Scope) -> EvalResult<bool> {
        self.scoped(|rt| {
            let value = rt.eval(expression, scope)?;
            Ok(rt.to_boolean_internal(value))
        })
    }

    fn declare(
        &self,
        kind: VariableKind,
        declarations: &[VariableDeclarator],
        scope: Scope,
    ) -> EvalResult<()> {
        for declaration in declarations {
            let value = match &declaration.init {
                Some(init) => Some(self.eval(init, scope)?),
                None => None,
            };
            match kind {
                VariableKind::Var => {
                    if let Some(value) = value {
                        self.assign_name(&declaration.name, value, scope)?;
                    }
                }
                VariableKind::Let => {
                    let value = value.unwrap_or(Value::Undefined);
                    self.define_own(scope.env, &declaration.name, value, PropertyFlags::PERMANENT)?;
                }
                VariableKind::Const => {
                    let value = value.unwrap_or(Value::Undefined);
                    self.define_own(
                        scope.env,
                        &declaration.name,
                        value,
                        PropertyFlags::PERMANENT | PropertyFlags::READ_ONLY,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn exec_statement(&self, statement: &Statement, scope: Scope) -> EvalResult<Completion> {
        if let Some(position) = statement.position() {
            self.set_line(position.line);
        }
        match statement {
            Statement::VariableDeclaration {
                kind, declarations, ..
            } => {
                self.declare(*kind, declarations, scope)?;
                Ok(Completion::Normal(None))
            }
            Statement::FunctionDeclaration { .. } | Statement::EmptyStatement { .. } => {
                Ok(Completion::Normal(None))
            }
            Statement::ExpressionStatement { expression, .. } => {
                Ok(Completion::Normal(Some(self.eval(expression, scope)?)))
            }
            Statement::ReturnStatement { argument, .. } => {
                let value = match argument {
                    Some(argument) => self.eval(argument, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::IfStatement {
                test,
                consequent,
                alternate,
                ..
            } => {
                if self.test(test, scope)? {
                    self.exec_rooted(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec_rooted(alternate, scope)
                } else {
                    Ok(Completion::Normal(None))
                }
            }
            Statement::WhileStatement { test, body, .. } => {
                let mut last = None;
                while self.test(test, scope)? {
                    match self.exec_rooted(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal(Some(v)) => last = Some(v),
                        _ => {}
                    }
                }
                Ok(Completion::Normal(last))
            }
            Statement::DoWhileStatement { body, test, .. } => {
                let mut last = None;
                loop {
                    match self.exec_rooted(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal(Some(v)) => last = Some(v),
                        _ => {}
                    }
                    if !self.test(test, scope)? {
                        break;
                    }
                }
                Ok(Completion::Normal(last))
            }
            Statement::ForStatement {
                init,
                test,
                update,
                body,
                ..
            } => {
                let scope = match init {
                    Some(ForInit::VariableDeclaration { kind, declarations }) => {
                        let scope = if *kind == VariableKind::Var {
                            scope
                        } else {
                            Scope {
                                env: self.new_environment(scope.env),
                                ..scope
                            }
                        };
                        self.declare(*kind, declarations, scope)?;
                        scope
                    }
                    Some(ForInit::Expression(expression)) => {
                        self.scoped(|rt| rt.eval(expression, scope).map(|_| ()))?;
                        scope
                    }
                    None => scope,
                };
                let mut last = None;
                loop {
                    if let Some(test) = test {
                        if !self.test(test, scope)? {
                            break;
                        }
                    }
                    match self.exec_rooted(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal(Some(v)) => last = Some(v),
                        _ => {}
                    }
                    if let Some(update) = update {
                        self.scoped(|rt| rt.eval(update, scope).map(|_| ()))?;
                    }
                }
                Ok(Completion::Normal(last))
            }
            Statement::ForInStatement { left, right, body, .. } => self.exec_for_in(left, right, body, scope),
            Statement::BlockStatement { body, .. } => self.exec_block(body, scope),
            Statement::BreakStatement { .. } => Ok(Completion::Break),
            Statement::ContinueStatement { .. } => Ok(Completion::Continue),
            Statement::ThrowStatement { argument, .. } => {
                let value = self.eval(argument, scope)?;
                Err(Abrupt::Throw(value))
            }
            Statement::TryStatement {
                block,
                handler,
                finalizer,
                ..
            } => {
                let mut result = self.exec_block(block, scope);
                if let (Err(abrupt), Some(handler)) = (&result, handler) {
                    if *abrupt != Abrupt::Quit {
                        let value = self.abrupt_to_value(abrupt.clone())?;
                        let env = self.new_environment(scope.env);
                        self.define_own(env, &handler.param, value, PropertyFlags::PERMANENT)?;
                        result = self.exec_block(&handler.body, Scope { env, ..scope });
                    }
                }
                if matches!(result, Err(Abrupt::Quit)) {
                    return result;
                }
                if let Some(finalizer) = finalizer {
                    match self.exec_block(finalizer, scope)? {
                        Completion::Normal(_) => {}
                        other => return Ok(other),
                    }
                }
                result
            }
        }
    }

    fn exec_for_in(
        &self,
        left: &ForInLeft,
        right: &Expression,
        body: &Statement,
        scope: Scope,
    ) -> EvalResult<Completion> {
        let subject = self.eval(right, scope)?;
        let (object, keys) = match subject {
            Value::Object(id) => (Some(id), self.for_in_keys(id)?),
            Value::String(id) => {
                let length = self.string_units(id)?.len();
                (None, (0..length).map(|i| i.to_string()).collect())
            }
            _ => (None, Vec::new()),
        };
        let scope = match left {
            ForInLeft::Declaration {
                kind: VariableKind::Let | VariableKind::Const,
                ..
            } => Scope {
                env: self.new_environment(scope.env),
                ..scope
            },
            _ => scope,
        };

        let mut last = None;
        for key in keys {
            if let Some(object) = object {
                if !self.has_property(object, &key, ResolveFlags::empty())? {
                    continue;
                }
            }
            let mark = self.heap.borrow().local_root_mark();
            let key_value = self.alloc_string(&key);
            match left {
                ForInLeft::Declaration {
                    kind: VariableKind::Var,
                    name,
                } => self.assign_name(name, key_value, scope)?,
                ForInLeft::Declaration { kind, name } => {
                    let flags = if *kind == VariableKind::Const {
                        PropertyFlags::PERMANENT | PropertyFlags::READ_ONLY
                    } else {
                        PropertyFlags::PERMANENT
                    };
                    self.define_own(scope.env, name, key_value, flags)?;
                }
                ForInLeft::Target(target) => {
                    let reference = self.reference_to(target, scope)?;
                    self.put_reference(&reference, key_value)?;
                }
            }
            let completion = self.exec_rooted(body, scope);
            self.heap.borrow_mut().truncate_local_roots(mark);
            match completion? {
                Completion::Break => break,
                Completion::Return(v) => return Ok(Completion::Return(self.temp(v))),
                Completion::Normal(Some(v)) => last = Some(self.temp(v)),
                _ => {}
            }
        }
        Ok(Completion::Normal(last))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Evaluate an expression. The result is rooted until the enclosing
    /// statement completes.
    pub(crate) fn eval(&self, expression: &Expression, scope: Scope) -> EvalResult {
        let value = self.eval_inner(expression, scope)?;
        Ok(self.temp(value))
    }

    fn eval_args(&self, arguments: &[Expression], scope: Scope) -> EvalResult<Vec<Value>> {
        arguments.iter().map(|a| self.eval(a, scope)).collect()
    }

    fn eval_inner(&self, expression: &Expression, scope: Scope) -> EvalResult {
        match expression {
            Expression::Identifier(name) => {
                let reference = self.reference_to(expression, scope)?;
                match reference {
                    Reference::Unresolved(_) => {
                        self.throw(ErrorKind::ReferenceError, format!("{} is not defined", name))
                    }
                    other => self.get_reference(&other),
                }
            }
            Expression::Literal(literal) => Ok(match literal {
                Literal::Number(n) => Value::from_f64(*n),
                Literal::String(s) => self.alloc_string(s),
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Null => Value::Null,
            }),
            Expression::ArrayExpression(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(match element {
                        Some(element) => self.eval(element, scope)?,
                        None => Value::Undefined,
                    });
                }
                let array = self.alloc_object(ObjectData::new(
                    ObjectClass::Array(values),
                    Some(self.realm.array_prototype),
                ));
                Ok(Value::Object(array))
            }
            Expression::ObjectExpression(properties) => self.eval_object_literal(properties, scope),
            Expression::FunctionExpression(function) => {
                Ok(Value::Object(self.make_function_expression(function, scope)?))
            }
            Expression::UnaryExpression { operator, argument } => self.eval_unary(*operator, argument, scope),
            Expression::UpdateExpression {
                operator,
                prefix,
                argument,
            } => {
                let reference = self.reference_to(argument, scope)?;
                let old = self.get_reference(&reference)?;
                let old = self.to_number_internal(old)?;
                let new = match operator {
                    UpdateOperator::Increment => old + 1.0,
                    UpdateOperator::Decrement => old - 1.0,
                };
                self.put_reference(&reference, Value::from_f64(new))?;
                Ok(Value::from_f64(if *prefix { new } else { old }))
            }
            Expression::BinaryExpression {
                left,
                operator,
                right,
            } => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                self.binary_op(*operator, l, r)
            }
            Expression::LogicalExpression {
                left,
                operator,
                right,
            } => {
                let l = self.eval(left, scope)?;
                let truthy = self.to_boolean_internal(l);
                match (operator, truthy) {
                    (LogicalOperator::And, false) | (LogicalOperator::Or, true) => Ok(l),
                    _ => self.eval(right, scope),
                }
            }
            Expression::AssignmentExpression {
                operator,
                left,
                right,
            } => {
                let reference = self.reference_to(left, scope)?;
                let value = match operator.binary_operator() {
                    None => self.eval(right, scope)?,
                    Some(op) => {
                        let current = self.get_reference(&reference)?;
                        let current = self.temp(current);
                        let r = self.eval(right, scope)?;
                        self.binary_op(op, current, r)?
                    }
                };
                let value = self.temp(value);
                self.put_reference(&reference, value)?;
                Ok(value)
            }
            Expression::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                let t = self.eval(test, scope)?;
                if self.to_boolean_internal(t) {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expression::CallExpression { callee, arguments } => {
                let (function, this) = match callee.as_ref() {
                    Expression::MemberExpression { .. } | Expression::Identifier(_) => {
                        let reference = self.reference_to(callee, scope)?;
                        let function = self.get_reference(&reference)?;
                        let this = match &reference {
                            Reference::Property { base, .. } => *base,
                            Reference::Binding { holder, .. } if !self.is_environment(*holder)? => {
                                Value::Object(*holder)
                            }
                            _ => Value::Undefined,
                        };
                        (function, this)
                    }
                    other => (self.eval(other, scope)?, Value::Undefined),
                };
                let function = self.temp(function);
                let args = self.eval_args(arguments, scope)?;
                let callable = match function {
                    Value::Object(id) => self.is_callable_value(function) || self.host_hooks(id).is_some(),
                    _ => false,
                };
                if !callable {
                    return self.throw(ErrorKind::TypeError, format!("{} is not a function", describe(callee)));
                }
                self.call_value(function, this, &args)
            }
            Expression::NewExpression { callee, arguments } => {
                let constructor = self.eval(callee, scope)?;
                let args = self.eval_args(arguments, scope)?;
                if !self.is_callable_value(constructor) {
                    return self.throw(
                        ErrorKind::TypeError,
                        format!("{} is not a constructor", describe(callee)),
                    );
                }
                self.construct_value(constructor, &args)
            }
            Expression::MemberExpression { .. } => {
                let reference = self.reference_to(expression, scope)?;
                self.get_reference(&reference)
            }
            Expression::ThisExpression => Ok(scope.this),
            Expression::SequenceExpression(expressions) => {
                let mut last = Value::Undefined;
                for expression in expressions {
                    last = self.eval(expression, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn eval_object_literal(&self, properties: &[ObjectProperty], scope: Scope) -> EvalResult {
        let object = self.alloc_object(ObjectData::ordinary(Some(self.realm.object_prototype)));
        for property in properties {
            match property.kind {
                PropertyKind::Init => {
                    let value = self.eval(&property.value, scope)?;
                    self.define_property(object, &property.key, value, PropertyFlags::empty())?;
                }
                PropertyKind::Get | PropertyKind::Set => {
                    let accessor = match self.eval(&property.value, scope)? {
                        Value::Object(id) => id,
                        _ => return self.throw(ErrorKind::SyntaxError, "invalid accessor"),
                    };
                    let (getter, setter) = if property.kind == PropertyKind::Get {
                        (Some(accessor), None)
                    } else {
                        (None, Some(accessor))
                    };
                    self.define_accessor_property(object, &property.key, getter, setter, PropertyFlags::empty())?;
                }
            }
        }
        Ok(Value::Object(object))
    }

    fn eval_unary(&self, operator: UnaryOperator, argument: &Expression, scope: Scope) -> EvalResult {
        match operator {
            UnaryOperator::Typeof => {
                if let Expression::Identifier(name) = argument {
                    if self.resolve_binding(scope, name)?.is_none() {
                        return Ok(self.alloc_string("undefined"));
                    }
                }
                let value = self.eval(argument, scope)?;
                Ok(self.alloc_string(self.type_of_internal(value)))
            }
            UnaryOperator::Delete => match argument {
                Expression::MemberExpression { .. } | Expression::Identifier(_) => {
                    match self.reference_to(argument, scope)? {
                        Reference::Property { base, key } => match base {
                            Value::Object(id) => Ok(Value::Boolean(self.delete_property(id, &key)?)),
                            _ => Ok(Value::Boolean(true)),
                        },
                        Reference::Binding { holder, name } => {
                            if self.is_environment(holder)? {
                                Ok(Value::Boolean(false))
                            } else {
                                Ok(Value::Boolean(self.delete_property(holder, &name)?))
                            }
                        }
                        Reference::Unresolved(_) => Ok(Value::Boolean(true)),
                    }
                }
                other => {
                    self.eval(other, scope)?;
                    Ok(Value::Boolean(true))
                }
            },
            UnaryOperator::Void => {
                self.eval(argument, scope)?;
                Ok(Value::Undefined)
            }
            UnaryOperator::Not => {
                let value = self.eval(argument, scope)?;
                Ok(Value::Boolean(!self.to_boolean_internal(value)))
            }
            UnaryOperator::Minus => {
                let value = self.eval(argument, scope)?;
                Ok(Value::from_f64(-self.to_number_internal(value)?))
            }
            UnaryOperator::Plus => {
                let value = self.eval(argument, scope)?;
                Ok(Value::from_f64(self.to_number_internal(value)?))
            }
            UnaryOperator::BitwiseNot => {
                let value = self.eval(argument, scope)?;
                Ok(Value::from_f64(!to_int32(self.to_number_internal(value)?) as f64))
            }
        }
    }

    /// Apply a binary operator to evaluated operands.
    pub(crate) fn binary_op(&self, operator: BinaryOperator, l: Value, r: Value) -> EvalResult {
        use BinaryOperator as B;
        let number = |f: fn(f64, f64) -> f64| -> EvalResult {
            let a = self.to_number_internal(l)?;
            let b = self.to_number_internal(r)?;
            Ok(Value::from_f64(f(a, b)))
        };
        let int32 = |f: fn(i32, u32) -> f64| -> EvalResult {
            let a = to_int32(self.to_number_internal(l)?);
            let b = to_uint32(self.to_number_internal(r)?);
            Ok(Value::from_f64(f(a, b)))
        };
        match operator {
            B::Add => {
                let a = self.temp(self.to_primitive(l, PreferredType::Default)?);
                let b = self.temp(self.to_primitive(r, PreferredType::Default)?);
                if a.is_string() || b.is_string() {
                    let a = self.to_js_string(a)?;
                    let b = self.to_js_string(b)?;
                    return self.concat_strings(a, b);
                }
                let x = self.to_number_internal(a)?;
                let y = self.to_number_internal(b)?;
                Ok(Value::from_f64(x + y))
            }
            B::Sub => number(|a, b| a - b),
            B::Mul => number(|a, b| a * b),
            B::Div => number(|a, b| a / b),
            B::Mod => number(|a, b| a % b),
            B::Eq => Ok(Value::Boolean(self.loose_equals(l, r)?)),
            B::NotEq => Ok(Value::Boolean(!self.loose_equals(l, r)?)),
            B::StrictEq => Ok(Value::Boolean(self.strict_equals_internal(l, r))),
            B::StrictNotEq => Ok(Value::Boolean(!self.strict_equals_internal(l, r))),
            B::Lt => Ok(Value::Boolean(self.less_than(l, r)? == Some(true))),
            B::Gt => Ok(Value::Boolean(self.less_than(r, l)? == Some(true))),
            B::LtEq => Ok(Value::Boolean(self.less_than(r, l)? == Some(false))),
            B::GtEq => Ok(Value::Boolean(self.less_than(l, r)? == Some(false))),
            B::BitwiseAnd => int32(|a, b| (a & b as i32) as f64),
            B::BitwiseOr => int32(|a, b| (a | b as i32) as f64),
            B::BitwiseXor => int32(|a, b| (a ^ b as i32) as f64),
            B::LeftShift => int32(|a, b| a.wrapping_shl(b & 0x1f) as f64),
            B::RightShift => int32(|a, b| (a >> (b & 0x1f)) as f64),
            B::UnsignedRightShift => int32(|a, b| ((a as u32) >> (b & 0x1f)) as f64),
            B::Instanceof => match r {
                Value::Object(constructor) if self.is_callable_value(r) => {
                    Ok(Value::Boolean(self.instance_of_internal(l, constructor)?))
                }
                _ => self.throw(ErrorKind::TypeError, "invalid 'instanceof' operand"),
            },
            B::In => match r {
                Value::Object(object) => {
                    let key = self.to_property_key(l)?;
                    Ok(Value::Boolean(self.has_property(object, &key, ResolveFlags::DETECTING)?))
                }
                _ => self.throw(ErrorKind::TypeError, "invalid 'in' operand"),
            },
        }
    }

    /// Run a parsed program body in `scope`.
    pub(crate) fn run_program(&self, body: &[Statement], scope: Scope) -> EvalResult {
        self.instantiate(body, scope)?;
        Ok(match self.exec_statements(body, scope)? {
            Completion::Normal(Some(value)) | Completion::Return(value) => value,
            _ => Value::Undefined,
        })
    }
}
