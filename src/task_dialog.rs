//! Task dialog configuration.
//!
//! See <https://learn.microsoft.com/en-us/windows/win32/api/commctrl/ns-commctrl-taskdialogconfig>
//! for the meaning of each field.

use alloc::string::String;
use core::mem::size_of;

use ahash::RandomState;
use indexmap::IndexMap;
use log::debug;

use crate::{constants::*, errors::*, record::*, types::*};

/// `PFTASKDIALOGCALLBACK`
pub type TaskDialogCallback = unsafe extern "system" fn(
    hwnd: usize,
    notification: u32,
    wparam: usize,
    lparam: isize,
    data: isize,
) -> HRESULT;

/// Custom buttons keyed by their command id, in display order.
pub type TaskDialogButtons = IndexMap<i32, String, RandomState>;

/// Logical task dialog configuration, serialized to `TASKDIALOGCONFIG` with
/// [`PackedRecordBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct TaskDialog {
    pub parent:                 usize,
    pub instance:               usize,
    /// `TDF_*` flags. `TDF_USE_HICON_MAIN` and `TDF_USE_HICON_FOOTER` are derived from the icons.
    pub flags:                  u32,
    /// `TDCBF_*` flags.
    pub common_buttons:         u32,
    pub window_title:           Option<String>,
    pub main_instruction:       Option<String>,
    pub content:                Option<String>,
    pub verification_text:      Option<String>,
    pub expanded_information:   Option<String>,
    pub expanded_control_text:  Option<String>,
    pub collapsed_control_text: Option<String>,
    pub footer:                 Option<String>,
    pub main_icon:              Option<ResourceRef>,
    pub footer_icon:            Option<ResourceRef>,
    pub buttons:                TaskDialogButtons,
    pub radio_buttons:          TaskDialogButtons,
    pub default_button:         i32,
    pub default_radio_button:   i32,
    pub callback:               Option<TaskDialogCallback>,
    pub callback_data:          isize,
    pub width:                  u32,
}

impl TaskDialog {
    pub fn new() -> Self { Self::default() }

    /// Add a custom button. A button with the same id is replaced in place.
    pub fn add_button<S: Into<String>>(&mut self, id: i32, text: S) -> &mut Self {
        self.buttons.insert(id, text.into());
        self
    }

    /// Add a radio button. A radio button with the same id is replaced in place.
    pub fn add_radio_button<S: Into<String>>(&mut self, id: i32, text: S) -> &mut Self {
        self.radio_buttons.insert(id, text.into());
        self
    }

    fn icon(
        builder: &mut PackedRecordBuilder, icon: Option<&ResourceRef>, flags: &mut u32, handle_flag: u32,
        name: &str,
    ) -> Result<usize, MarshalError> {
        match icon {
            Some(icon) => {
                if icon.is_handle() {
                    *flags |= handle_flag;
                } else if *flags & handle_flag != 0 {
                    return Err(MarshalError::invalid_configuration(format_args!(
                        "{} icon flag set without an icon handle",
                        name
                    )));
                }
                builder.pin_resource(icon)
            }
            None if *flags & handle_flag != 0 => Err(MarshalError::invalid_configuration(
                format_args!("{} icon flag set without an icon", name),
            )),
            None => Ok(0),
        }
    }
}

/// `TASKDIALOG_BUTTON` sub-record.
struct ButtonEntry<'a> {
    id:   i32,
    text: &'a str,
}
impl PackedRecord for ButtonEntry<'_> {
    type Layout = TaskDialogButton;

    fn pack(&self, builder: &mut PackedRecordBuilder) -> Result<TaskDialogButton, MarshalError> {
        Ok(TaskDialogButton {
            button_id:   self.id,
            button_text: builder.pin_text(self.text)?,
        })
    }
}

fn entries(buttons: &TaskDialogButtons) -> alloc::vec::Vec<ButtonEntry<'_>> {
    buttons.iter().map(|(id, text)| ButtonEntry { id: *id, text }).collect()
}

impl PackedRecord for TaskDialog {
    type Layout = TaskDialogConfig;

    fn pack(&self, builder: &mut PackedRecordBuilder) -> Result<TaskDialogConfig, MarshalError> {
        let mut flags = self.flags;

        // pinned in header order
        let window_title = builder.pin_optional_text(self.window_title.as_deref())?;
        let main_icon =
            Self::icon(builder, self.main_icon.as_ref(), &mut flags, TDF_USE_HICON_MAIN, "main")?;
        let main_instruction = builder.pin_optional_text(self.main_instruction.as_deref())?;
        let content = builder.pin_optional_text(self.content.as_deref())?;
        let (buttons_count, buttons) = builder.pin_records(&entries(&self.buttons))?;
        let (radio_buttons_count, radio_buttons) =
            builder.pin_records(&entries(&self.radio_buttons))?;
        let verification_text = builder.pin_optional_text(self.verification_text.as_deref())?;
        let expanded_information =
            builder.pin_optional_text(self.expanded_information.as_deref())?;
        let expanded_control_text =
            builder.pin_optional_text(self.expanded_control_text.as_deref())?;
        let collapsed_control_text =
            builder.pin_optional_text(self.collapsed_control_text.as_deref())?;
        let footer_icon = Self::icon(
            builder,
            self.footer_icon.as_ref(),
            &mut flags,
            TDF_USE_HICON_FOOTER,
            "footer",
        )?;
        let footer = builder.pin_optional_text(self.footer.as_deref())?;

        debug!(
            "task dialog: flags {:#x}, {} buttons, {} radio buttons, {} pinned blocks",
            flags,
            buttons_count,
            radio_buttons_count,
            builder.pinned_count()
        );

        Ok(TaskDialogConfig {
            size: size_of::<TaskDialogConfig>() as u32,
            hwnd_parent: self.parent,
            instance: self.instance,
            flags,
            common_buttons: self.common_buttons,
            window_title,
            main_icon,
            main_instruction,
            content,
            buttons_count,
            buttons,
            default_button: self.default_button,
            radio_buttons_count,
            radio_buttons,
            default_radio_button: self.default_radio_button,
            verification_text,
            expanded_information,
            expanded_control_text,
            collapsed_control_text,
            footer_icon,
            footer,
            callback: self.callback.map_or(0, |callback| callback as usize),
            callback_data: self.callback_data,
            width: self.width,
        })
    }
}
