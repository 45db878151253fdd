use crate::web_document::web_document;
use crate::web_error_handling::JsResult;


pub trait WebElementExt {
    fn with_text_content(self, text: &str) -> web_sys::Element;
    fn with_attribute(self, name: &str, value: &str) -> JsResult<web_sys::Element>;
    fn with_classes<'a>(self, classes: impl IntoIterator<Item = &'a str>) -> JsResult<web_sys::Element>;

    fn set_displayed(&self, displayed: bool) -> JsResult<()>;
    fn set_class(&self, class: &str, on: bool) -> JsResult<()>;

    fn remove_all_children(&self);
    fn append_new_element(&self, local_name: &str) -> JsResult<web_sys::Element>;
}

impl WebElementExt for web_sys::Element {
    fn with_text_content(self, text: &str) -> web_sys::Element {
        self.set_text_content(Some(text));
        self
    }

    fn with_attribute(self, name: &str, value: &str) -> JsResult<web_sys::Element> {
        self.set_attribute(name, value)?;
        Ok(self)
    }

    fn with_classes<'a>(self, classes: impl IntoIterator<Item = &'a str>) -> JsResult<web_sys::Element> {
        for class in classes {
            self.class_list().add_1(class)?;
        }
        Ok(self)
    }

    fn set_displayed(&self, displayed: bool) -> JsResult<()> {
        self.set_class("display-none", !displayed)
    }

    fn set_class(&self, class: &str, on: bool) -> JsResult<()> {
        self.class_list().toggle_with_force(class, on)?;
        Ok(())
    }

    fn remove_all_children(&self) { self.replace_children_with_node_0() }

    fn append_new_element(&self, local_name: &str) -> JsResult<web_sys::Element> {
        let node = web_document()?.create_element(local_name)?;
        self.append_child(&node)?;
        Ok(node)
    }
}
